//! Configuration management for agents.
//!
//! A [`BackendConfig`] describes which backend serves the root namespace and
//! which backends are mounted under path prefixes. It is usually loaded from
//! JSON and turned into a ready [`BackendProtocol`](agent_backends::BackendProtocol)
//! with [`BackendConfig::build`].

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::CONFIG_ENV;
pub use schema::{BackendConfig, BackendSpec, RouteSpec};
