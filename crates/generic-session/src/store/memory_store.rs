use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{sync::RwLock, time::Instant};

use crate::{error::StoreError, session_traits::SessionStore};

#[derive(Clone)]
struct MemoryEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory session store implementation
///
/// Keeps records in a HashMap behind a read-write lock and honors the ttl
/// handed in by the adapter. Expired records read as missing and are dropped
/// on the next write. Not meant for production: it grows with every client
/// and is not shared between processes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    store: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let store = self.store.read().await;
        store.values().filter(|entry| !entry.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let store = self.store.read().await;
        store
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>()
    }

    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        store.clear();
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let store = self.store.read().await;
        let value = store
            .get(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value.clone());
        tracing::trace!("memory store get {key}: {}", value.is_some());
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut store = self.store.write().await;
        store.retain(|_, entry| !entry.is_expired(now));
        store.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        Ok(())
    }

    async fn destroy(&self, key: &str) -> Result<(), StoreError> {
        let mut store = self.store.write().await;
        store.remove(key);
        Ok(())
    }
}
