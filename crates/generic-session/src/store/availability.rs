use std::time::Duration;

use tokio::{sync::watch, time::Instant};

use crate::error::{SessionError, SessionResult};

/// Observable availability of a session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Available,
    /// Disconnected, waiting up to the reconnect timeout for a reconnect.
    Pending,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Available,
    Pending { deadline: Instant },
    Unavailable,
}

/// Availability state machine of one store adapter.
///
/// ```text
/// available   --disconnect--> pending (deadline = now + reconnect_timeout)
/// pending     --connect-----> available
/// pending     --deadline----> unavailable
/// unavailable --connect-----> available
/// ```
///
/// All transitions are compare-and-set updates of a single `watch` cell, so
/// concurrent disconnect notifications install exactly one deadline. The
/// `pending -> unavailable` step happens lazily, the first time the lapsed
/// deadline is observed.
pub struct StoreAvailability {
    reconnect_timeout: Duration,
    state: watch::Sender<Cell>,
}

impl StoreAvailability {
    pub fn new(reconnect_timeout: Duration) -> Self {
        let (state, _) = watch::channel(Cell::Available);
        Self {
            reconnect_timeout,
            state,
        }
    }

    pub fn reconnect_timeout(&self) -> Duration {
        self.reconnect_timeout
    }

    pub fn status(&self) -> StoreStatus {
        let cell = *self.state.borrow();
        match cell {
            Cell::Available => StoreStatus::Available,
            Cell::Unavailable => StoreStatus::Unavailable,
            Cell::Pending { deadline } if deadline <= Instant::now() => {
                self.expire(deadline);
                StoreStatus::Unavailable
            }
            Cell::Pending { .. } => StoreStatus::Pending,
        }
    }

    pub fn disconnect(&self) {
        let deadline = Instant::now() + self.reconnect_timeout;
        let changed = self.state.send_if_modified(|cell| {
            if *cell == Cell::Available {
                *cell = Cell::Pending { deadline };
                return true;
            }
            false
        });
        if changed {
            tracing::warn!(
                "session store disconnected, waiting {:?} for reconnect",
                self.reconnect_timeout
            );
        }
    }

    pub fn connect(&self) {
        let changed = self.state.send_if_modified(|cell| {
            if *cell != Cell::Available {
                *cell = Cell::Available;
                return true;
            }
            false
        });
        if changed {
            tracing::info!("session store connected");
        }
    }

    /// Resolves once the store can serve requests.
    ///
    /// Fails right away with [`SessionError::StoreUnavailable`] if the store is
    /// unavailable, and after the pending deadline if no reconnect arrives.
    pub async fn wait_available(&self) -> SessionResult<()> {
        let mut rx = self.state.subscribe();
        let current = *rx.borrow_and_update();
        let deadline = match current {
            Cell::Available => return Ok(()),
            Cell::Unavailable => {
                tracing::debug!("store is unavailable");
                return Err(SessionError::StoreUnavailable);
            }
            Cell::Pending { deadline } => deadline,
        };

        tracing::debug!("store is disconnected and pending");
        let settled = tokio::time::timeout_at(
            deadline,
            rx.wait_for(|cell| !matches!(cell, Cell::Pending { .. })),
        )
        .await;

        match settled {
            Ok(Ok(cell)) if *cell == Cell::Available => Ok(()),
            Ok(_) => Err(SessionError::StoreUnavailable),
            Err(_elapsed) => {
                self.expire(deadline);
                Err(SessionError::StoreUnavailable)
            }
        }
    }

    fn expire(&self, deadline: Instant) {
        let changed = self.state.send_if_modified(|cell| {
            if *cell == (Cell::Pending { deadline }) {
                *cell = Cell::Unavailable;
                return true;
            }
            false
        });
        if changed {
            tracing::warn!("session store did not reconnect in time, marking unavailable");
        }
    }
}
