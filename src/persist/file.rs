use super::KeyValueStorage;
use crate::error::PersistenceError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Key-value storage kept as one JSON object in a file.
///
/// Writes go to a sibling temp file which is then renamed over the original,
/// so a crash mid-write leaves the previous contents intact. Concurrent
/// writers within the process are serialized. Reads of a corrupt file fail
/// with [`PersistenceError::Serialization`]; writes replace it.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like `load`, but a corrupt file reads as empty so the next save replaces it.
    async fn load_for_write(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        match self.load().await {
            Err(PersistenceError::Serialization(err)) => {
                warn!(path = %self.path.display(), error = %err, "Local storage is corrupt, replacing it");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    async fn save(&self, values: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(values)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), entries = values.len(), "Saved local storage");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load_for_write().await?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values).await
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load_for_write().await?;
        if values.remove(key).is_some() {
            self.save(&values).await?;
        }
        Ok(())
    }
}
