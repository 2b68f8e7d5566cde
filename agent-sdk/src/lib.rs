//! Agent storage SDK facade.
//!
//! Depend on this crate via `cargo add agent-sdk`. It bundles the internal
//! crates behind feature flags so downstream users can enable only the
//! components their agents need.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use agent_primitives as primitives;

/// Storage backends and the routing composite (enabled by `backends` feature).
#[cfg(feature = "backends")]
pub use agent_backends as backends;

/// Tracing subscriber setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use agent_telemetry as telemetry;

/// Backend topology configuration (enabled by `config` feature).
#[cfg(feature = "config")]
pub use agent_config as config;
