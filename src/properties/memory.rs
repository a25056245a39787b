use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{PropertyConnection, PropertyStore, StoreError};

/// In-process property store, used for local development and tests.
#[derive(Clone, Default)]
pub struct MemoryPropertyStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
    opened: Arc<AtomicUsize>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw entry, standing in for the pipeline.
    #[cfg(test)]
    pub async fn put(&self, key: impl Into<String>, value: Value) {
        self.entries.write().await.insert(key.into(), value);
    }

    #[cfg(test)]
    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().await.remove(key)
    }

    /// Number of connections handed out so far.
    #[cfg(test)]
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

struct MemoryConnection {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

#[async_trait]
impl PropertyConnection for MemoryConnection {
    async fn fetch(&mut self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }
}

#[async_trait]
impl PropertyStore for MemoryPropertyStore {
    async fn open(&self) -> Result<Box<dyn PropertyConnection>, StoreError> {
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MemoryConnection {
            entries: self.entries.clone(),
        }))
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}
