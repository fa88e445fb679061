use std::sync::Arc;

use tokio::sync::broadcast;

use super::StoreAvailability;

/// Connectivity change reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Connect,
    Disconnect,
}

/// Handle given to a backend so it can report connectivity changes.
///
/// Every event updates the adapter's [`StoreAvailability`] and is then
/// re-broadcast, unchanged, to subscribers of
/// [`StoreAdapter::subscribe`](crate::StoreAdapter::subscribe).
#[derive(Clone)]
pub struct ConnectivityListener {
    availability: Arc<StoreAvailability>,
    events: broadcast::Sender<StoreEvent>,
}

impl ConnectivityListener {
    pub(crate) fn new(
        availability: Arc<StoreAvailability>,
        events: broadcast::Sender<StoreEvent>,
    ) -> Self {
        Self {
            availability,
            events,
        }
    }

    pub fn notify(&self, event: StoreEvent) {
        match event {
            StoreEvent::Connect => self.availability.connect(),
            StoreEvent::Disconnect => self.availability.disconnect(),
        }
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn connect(&self) {
        self.notify(StoreEvent::Connect);
    }

    pub fn disconnect(&self) {
        self.notify(StoreEvent::Disconnect);
    }
}
