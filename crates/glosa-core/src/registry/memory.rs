//! Process-local registry.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheRecord, CacheRegistry};
use crate::error::Result;

/// Registry kept in memory; records vanish with the process.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    records: RwLock<Vec<CacheRecord>>,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheRegistry for InMemoryRegistry {
    async fn append(&self, record: CacheRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<CacheRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}
