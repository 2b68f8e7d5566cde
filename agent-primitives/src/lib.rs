//! Core shared types for agents built on the storage backends.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;

/// Error type and result alias shared across the SDK.
pub use error::{Error, Result};
/// Identifier for the agent owning persisted files.
pub use ids::AgentId;
