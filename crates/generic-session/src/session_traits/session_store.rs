use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::StoreError, store::ConnectivityListener};

/// Trait defining the interface of a raw session storage backend
///
/// Backends deal in already-prefixed keys and opaque JSON records; prefixing,
/// ttl computation and (de)serialization are done by the
/// [`StoreAdapter`](crate::StoreAdapter) wrapping them.
/// Implementors must be Send and Sync to support concurrent access.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Retrieves a record by its key
    ///
    /// # Returns
    /// * `Ok(None)` or `Err(StoreError::NotFound)` - both mean the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Inserts or replaces a record
    ///
    /// # Arguments
    /// * `key` - The prefixed session key
    /// * `value` - The serialized session
    /// * `ttl` - How long the backend should keep the record, if known
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Deletes a record by its key
    async fn destroy(&self, key: &str) -> Result<(), StoreError>;

    /// Called once when the backend is wrapped by an adapter.
    ///
    /// Backends with a connection (Redis, Couchbase, ...) keep the listener
    /// and report `connect` / `disconnect` through it. The default does nothing.
    fn watch_connectivity(&self, _listener: ConnectivityListener) {}
}
