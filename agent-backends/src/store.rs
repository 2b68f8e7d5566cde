//! Persistent backend delegating to an injected key-value store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

use agent_primitives::AgentId;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::ops::{self, EMPTY_OLD_STRING};
use crate::pattern;
use crate::protocol::BackendProtocol;
use crate::record::{EditResult, EntryInfo, FileMeta, FileRecord, GrepMatch, WriteResult};
use crate::{BackendError, BackendResult};

/// Key-value persistence consumed by [`StoreBackend`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Loads the value stored under `key`, if any.
    async fn load(&self, key: &str) -> BackendResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: Value) -> BackendResult<()>;
}

/// Process-local [`KeyValueStore`], mainly for tests and single-process agents.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored keys in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        let guard = self.entries.read().await;
        let mut keys: Vec<_> = guard.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> BackendResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> BackendResult<()> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

type MetaIndex = BTreeMap<String, FileMeta>;

/// Backend persisting records across sessions through a [`KeyValueStore`].
///
/// Each record lives under `files:<agent>:data:<path>`; a single document at
/// `files:<agent>:meta` indexes every path. Writes and edits hold a
/// per-instance lock across the data save and the index read-modify-write,
/// so concurrent writers sharing this instance never drop index entries.
/// Separate instances over the same store and agent are not coordinated.
pub struct StoreBackend {
    store: Arc<dyn KeyValueStore>,
    agent_id: AgentId,
    namespace: String,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBackend")
            .field("agent_id", &self.agent_id)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl StoreBackend {
    /// Creates a backend storing files for `agent_id` in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, agent_id: AgentId) -> Self {
        let namespace = format!("files:{agent_id}");
        Self {
            store,
            agent_id,
            namespace,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the owning agent.
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    fn data_key(&self, path: &str) -> String {
        format!("{}:data:{path}", self.namespace)
    }

    fn meta_key(&self) -> String {
        format!("{}:meta", self.namespace)
    }

    async fn load_record(&self, path: &str) -> BackendResult<Option<FileRecord>> {
        match self.store.load(&self.data_key(path)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn load_index(&self) -> BackendResult<MetaIndex> {
        match self.store.load(&self.meta_key()).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(MetaIndex::new()),
        }
    }

    /// Saves the index entry, then the record. Callers hold `write_lock`.
    ///
    /// A failed data save leaves at most a dangling index entry, which reads
    /// report as not found and grep skips; a record is never stored without
    /// being indexed.
    async fn save_record(&self, path: &str, record: &FileRecord) -> BackendResult<()> {
        let mut index = self.load_index().await?;
        index.insert(path.to_owned(), record.meta());
        self.store
            .save(&self.meta_key(), serde_json::to_value(&index)?)
            .await?;

        self.store
            .save(&self.data_key(path), serde_json::to_value(record)?)
            .await
    }
}

#[async_trait]
impl BackendProtocol for StoreBackend {
    async fn list(&self, path: &str) -> BackendResult<Vec<EntryInfo>> {
        let index = self.load_index().await?;
        Ok(ops::list_children(
            path,
            index.iter().map(|(p, meta)| (p.as_str(), *meta)),
        ))
    }

    async fn read(&self, path: &str, offset: usize, limit: usize) -> BackendResult<String> {
        let record = self
            .load_record(path)
            .await?
            .ok_or_else(|| BackendError::not_found(path))?;
        Ok(ops::read_window(record.lines(), offset, limit))
    }

    async fn write(&self, path: &str, content: &str) -> BackendResult<WriteResult> {
        let _guard = self.write_lock.lock().await;
        let now = SystemTime::now();
        let record = match self.load_record(path).await? {
            Some(existing) => existing.overwritten(content, now),
            None => FileRecord::from_content(content, now),
        };
        self.save_record(path, &record).await?;
        debug!(agent_id = %self.agent_id, path, bytes = content.len(), "store backend write");

        Ok(WriteResult::success(path, content.len() as u64))
    }

    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> BackendResult<EditResult> {
        if old.is_empty() {
            return Ok(EditResult::failure(path, EMPTY_OLD_STRING));
        }

        let _guard = self.write_lock.lock().await;
        let Some(mut record) = self.load_record(path).await? else {
            return Ok(EditResult::failure(path, format!("file not found: {path}")));
        };

        let (content, replacements) =
            ops::replace_text(&record.content(), old, new, replace_all);
        if replacements > 0 {
            record.replace_content(&content, SystemTime::now());
            self.save_record(path, &record).await?;
        }
        debug!(agent_id = %self.agent_id, path, replacements, "store backend edit");

        Ok(EditResult::success(path, replacements))
    }

    async fn grep(
        &self,
        pattern: &str,
        path: &str,
        glob: Option<&str>,
    ) -> BackendResult<Vec<GrepMatch>> {
        let re = pattern::compile_grep(pattern)?;
        let filter = pattern::compile_name_filter(glob)?;

        let index = self.load_index().await?;
        let mut matches = Vec::new();
        for file_path in index.keys() {
            if !file_path.starts_with(path) || !pattern::name_matches(filter.as_ref(), file_path) {
                continue;
            }
            // Index entries whose data vanished are skipped.
            let Some(record) = self.load_record(file_path).await? else {
                continue;
            };
            matches.extend(pattern::grep_lines(
                &re,
                file_path,
                record.lines().iter().map(String::as_str),
            ));
        }
        Ok(matches)
    }

    async fn glob(&self, pattern: &str, path: &str) -> BackendResult<Vec<EntryInfo>> {
        let dir = if path.is_empty() { "/" } else { path };
        let re = pattern::compile_glob(pattern)?;

        let index = self.load_index().await?;
        Ok(index
            .iter()
            .filter(|(file_path, _)| ops::glob_matches(&re, file_path, dir))
            .map(|(file_path, meta)| meta.entry(file_path.as_str()))
            .collect())
    }

    fn name(&self) -> &'static str {
        "store"
    }
}
