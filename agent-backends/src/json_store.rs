//! Durable [`KeyValueStore`] keeping one JSON document per key on disk.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use uuid::Uuid;

use crate::BackendResult;
use crate::store::KeyValueStore;

/// File-backed store writing each key to `<dir>/<encoded-key>.json`.
///
/// Saves go through a temporary file and a rename, so readers never observe
/// a partially written document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (or creates) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors encountered while creating the directory.
    pub async fn open(dir: impl Into<PathBuf>) -> BackendResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Returns the directory holding the documents.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

/// Encodes a key into a file name, escaping everything but `[A-Za-z0-9_.-]`.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.') {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn load(&self, key: &str) -> BackendResult<Option<Value>> {
        match fs::read(self.key_path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, key: &str, value: Value) -> BackendResult<()> {
        let target = self.key_path(key);
        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, serde_json::to_vec(&value)?).await?;
        if let Err(err) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}
