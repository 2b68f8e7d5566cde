//! Observability utilities for agents.

#![warn(missing_docs, clippy::pedantic)]

pub mod tracing_support;

pub use tracing_support::{TelemetryConfig, init_tracing};
