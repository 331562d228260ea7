//! Cache document persisted as a single JSON file.

use crate::domain::{CacheDocument, CacheStore};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Whole-document JSON file store.
///
/// Writes go through a sibling temp file and a rename, so a crash mid-write
/// leaves the previous document in place. Concurrent writers in this process
/// are serialized.
pub struct JsonFileCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cache.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CacheStore for JsonFileCache {
    async fn read(&self) -> CacheDocument {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Cannot read cache file {}: {}", self.path.display(), e);
                }
                return CacheDocument::new();
            }
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return CacheDocument::new();
        }

        match serde_json::from_slice::<CacheDocument>(&content) {
            Ok(document) => document,
            Err(e) => {
                warn!("Cache file {} is corrupt, treating as empty: {}", self.path.display(), e);
                CacheDocument::new()
            }
        }
    }

    async fn write(&self, document: &CacheDocument) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(document).context("Failed to serialize cache document")?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Wrote {} cache groups to {}", document.len(), self.path.display());
        Ok(())
    }
}
