mod availability;
mod connectivity;
mod memory_store;

pub use availability::*;
pub use connectivity::*;
pub use memory_store::*;

use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::sync::broadcast;

use crate::{error::StoreError, session::Session, session_traits::SessionStore};

/// Default key namespace.
pub const DEFAULT_PREFIX: &str = "sess:";

// Default wait for a disconnected store to come back (10 seconds)
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Settings of a [`StoreAdapter`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Prepended to every session id before it reaches the backend.
    pub prefix: String,
    /// Explicit record ttl. When `None` the ttl follows the session cookie.
    pub ttl: Option<Duration>,
    /// How long a disconnected backend stays `pending` before it is
    /// declared unavailable.
    pub reconnect_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            ttl: None,
            reconnect_timeout: DEFAULT_RECONNECT_TIMEOUT,
        }
    }
}

/// Wraps a raw [`SessionStore`] backend for the session middleware.
///
/// The adapter namespaces keys with the configured prefix, derives record
/// ttls from the session cookie, turns JSON records back into [`Session`]s
/// and tracks backend connectivity in a [`StoreAvailability`].
pub struct StoreAdapter {
    backend: Arc<dyn SessionStore>,
    options: StoreOptions,
    availability: Arc<StoreAvailability>,
    events: broadcast::Sender<StoreEvent>,
}

impl StoreAdapter {
    pub fn new(backend: Arc<dyn SessionStore>, options: StoreOptions) -> Self {
        let availability = Arc::new(StoreAvailability::new(options.reconnect_timeout));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        backend.watch_connectivity(ConnectivityListener::new(
            Arc::clone(&availability),
            events.clone(),
        ));
        Self {
            backend,
            options,
            availability,
            events,
        }
    }

    pub fn backend(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.backend)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn availability(&self) -> &StoreAvailability {
        &self.availability
    }

    /// Receives the backend's connectivity events, re-emitted unchanged.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn key(&self, sid: &str) -> String {
        format!("{}{}", self.options.prefix, sid)
    }

    /// Loads a session.
    ///
    /// A missing key, whether reported as `Ok(None)` or
    /// [`StoreError::NotFound`], yields `Ok(None)`. A record that is not a valid
    /// session is treated the same way.
    pub async fn get(&self, sid: &str) -> Result<Option<Session>, StoreError> {
        let key = self.key(sid);
        tracing::trace!("GET {key}");
        let record = match self.backend.get(&key).await {
            Ok(Some(record)) => record,
            Ok(None) | Err(StoreError::NotFound) => {
                tracing::trace!("GET {key} empty");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        match serde_json::from_value::<Session>(record) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                tracing::warn!("discarding unreadable session record {key}: {err}");
                Ok(None)
            }
        }
    }

    pub async fn set(&self, sid: &str, session: &Session) -> Result<(), StoreError> {
        let key = self.key(sid);
        let ttl = self.ttl_for(session);
        let value = serde_json::to_value(session)?;
        tracing::trace!("SET {key} ttl {ttl:?}");
        self.backend.set(&key, value, ttl).await?;
        tracing::trace!("SET {key} complete");
        Ok(())
    }

    pub async fn destroy(&self, sid: &str) -> Result<(), StoreError> {
        let key = self.key(sid);
        tracing::trace!("DEL {key}");
        self.backend.destroy(&key).await
    }

    /// Record ttl for `session`.
    ///
    /// An explicit ttl wins. Otherwise the time left until `cookie.expires`
    /// (rounded up to the millisecond, never negative) is used, then
    /// `cookie.max_age`.
    pub fn ttl_for(&self, session: &Session) -> Option<Duration> {
        if let Some(ttl) = self.options.ttl {
            return Some(ttl);
        }
        if let Some(expires) = session.cookie.expires {
            let remaining = expires - OffsetDateTime::now_utc();
            let nanos = remaining.whole_nanoseconds().max(0);
            let millis = (nanos + 999_999) / 1_000_000;
            return Some(Duration::from_millis(
                u64::try_from(millis).unwrap_or(u64::MAX),
            ));
        }
        session.cookie.max_age.map(Duration::from_millis)
    }
}
