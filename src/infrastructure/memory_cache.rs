//! In-process cache store, used by tests and when no cache file is wanted.

use crate::domain::{CacheDocument, CacheStore};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryCache {
    document: RwLock<CacheDocument>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document.
    pub fn with_document(document: CacheDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn read(&self) -> CacheDocument {
        self.document.read().await.clone()
    }

    async fn write(&self, document: &CacheDocument) -> anyhow::Result<()> {
        *self.document.write().await = document.clone();
        Ok(())
    }
}
