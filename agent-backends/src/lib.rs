//! Path-addressed storage backends for agents.
//!
//! Every backend implements [`BackendProtocol`]: list, read, write, edit,
//! grep and glob over absolute `/`-rooted paths. [`StateBackend`] keeps
//! records in memory for one session, [`StoreBackend`] persists them in a
//! namespaced [`KeyValueStore`], [`FilesystemBackend`] maps paths into a
//! sandboxed directory, and [`CompositeBackend`] routes path prefixes to any
//! of the above.

#![warn(missing_docs, clippy::pedantic)]

mod composite;
mod error;
mod filesystem;
mod json_store;
mod ops;
mod protocol;
mod record;
mod sandbox;
mod state;
mod store;

pub mod format;
pub mod pattern;

pub use composite::{CompositeBackend, Gathered, Route, RouteFailure};
pub use error::{BackendError, BackendResult};
pub use filesystem::{FilesystemBackend, SandboxEntry, SandboxFs, SandboxStat};
pub use json_store::JsonFileStore;
pub use protocol::BackendProtocol;
pub use record::{EditResult, EntryInfo, FileMeta, FileRecord, GrepMatch, WriteResult};
pub use sandbox::LocalSandbox;
pub use state::StateBackend;
pub use store::{KeyValueStore, MemoryStore, StoreBackend};
