use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::data::PersistenceGateway;

/// Directory-backed key-value store.
///
/// Layout: `{folder}/{sha256(key)}.json`. Hashing keeps arbitrary keys (user ids,
/// project ids) safe as file names.
#[derive(Debug, Clone)]
pub struct FileStore {
    folder: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `folder`, defaulting to `.promptcraft`.
    pub fn new(folder: Option<PathBuf>) -> Self {
        Self {
            folder: folder.unwrap_or_else(|| PathBuf::from(".promptcraft")),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.folder
            .join(format!("{}.json", hex::encode(hasher.finalize())))
    }
}

#[async_trait]
impl PersistenceGateway for FileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.entry_path(key);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse stored value for key '{}'", key))?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        fs::create_dir_all(&self.folder)
            .await
            .with_context(|| format!("Failed to create store directory {}", self.folder.display()))?;

        let path = self.entry_path(key);
        let content = serde_json::to_string_pretty(&value)
            .context("Failed to serialize stored value")?;

        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
