//! Key-value store in one JSON file

use async_trait::async_trait;
use dapctl_config::paths::ensure_parent_dir;
use dapctl_core::{Error, Result};
use dapctl_logging::{debug, warn};
use dapctl_ports::StorageService;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Stores every key as a member of one JSON object.
///
/// A missing or unreadable file reads as empty.
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

    async fn read_all(&self) -> Map<String, Value> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read state file: {}", e);
                return Map::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "Ignoring malformed state file");
                Map::new()
            }
        }
    }
}

#[async_trait]
impl StorageService for FileStorage {
    async fn get_data(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await.remove(key))
    }

    async fn set_data(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.read_all().await;
        data.insert(key.to_string(), value);

        ensure_parent_dir(&self.path)?;
        let content = serde_json::to_string_pretty(&Value::Object(data))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| Error::Storage(format!("{}: {}", self.path.display(), e)))?;
        debug!(key, path = %self.path.display(), "Stored state");
        Ok(())
    }
}
