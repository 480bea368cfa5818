//! Notification queue: bounded, ordered user-facing alerts.
//!
//! Any chain step or feature code can push an alert. Display surfaces either
//! pull a snapshot with `list()` or `subscribe()` to change events. Events are
//! sent after the internal lock is released, so a subscriber reacting to an
//! event can push again without deadlocking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert queue capacity must be at least 1")]
    ZeroCapacity,
}

/// Unique alert identifier, never reused within a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AlertId(u64);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A single user-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub id: AlertId,
    pub kind: AlertKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(with = "ttl_millis")]
    pub ttl: Option<Duration>,
}

mod ttl_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match ttl {
            Some(ttl) => s.serialize_some(&(ttl.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }
}

/// Queue change notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    Added(AlertRecord),
    Dismissed(AlertId),
    Expired(AlertId),
    Evicted(AlertId),
    Cleared,
}

struct Entry {
    record: AlertRecord,
    timer: Option<JoinHandle<()>>,
}

impl Entry {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct QueueState {
    next_id: u64,
    entries: VecDeque<Entry>,
}

struct Shared {
    capacity: usize,
    state: Mutex<QueueState>,
    events: broadcast::Sender<AlertEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: AlertEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Remove `id` if still present. The single removal point for dismissal,
    /// expiry and eviction, so a second removal of the same id is a no-op.
    fn remove(&self, id: AlertId) -> Option<Entry> {
        let mut state = self.lock();
        let index = state.entries.iter().position(|e| e.record.id == id)?;
        state.entries.remove(index)
    }

    fn expire(&self, id: AlertId) {
        // The expiring task is this entry's own timer; dropping the handle
        // detaches it instead of aborting the running task.
        if let Some(mut entry) = self.remove(id) {
            entry.timer = None;
            debug!(alert_id = %id, "alert expired");
            self.emit(AlertEvent::Expired(id));
        }
    }
}

/// Bounded FIFO of alerts with per-entry expiry.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct AlertQueue {
    shared: Arc<Shared>,
}

impl AlertQueue {
    /// Create a queue holding at most `capacity` alerts.
    pub fn new(capacity: usize) -> Result<Self, AlertError> {
        if capacity == 0 {
            return Err(AlertError::ZeroCapacity);
        }

        let (events, _rx) = broadcast::channel(64);
        Ok(Self {
            shared: Arc::new(Shared {
                capacity,
                state: Mutex::new(QueueState {
                    next_id: 1,
                    entries: VecDeque::with_capacity(capacity),
                }),
                events,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Append an alert and return its id.
    ///
    /// With a `ttl`, the alert is removed automatically once it elapses unless
    /// it was dismissed first. If the queue is full the oldest alert is
    /// evicted, whatever its kind.
    pub fn push(&self, kind: AlertKind, message: impl Into<String>, ttl: Option<Duration>) -> AlertId {
        let ttl = ttl.filter(|ttl| !ttl.is_zero());

        let (record, evicted) = {
            let mut state = self.shared.lock();
            let id = AlertId(state.next_id);
            state.next_id += 1;

            let record = AlertRecord {
                id,
                kind,
                message: message.into(),
                created_at: Utc::now(),
                ttl,
            };

            let timer = ttl.and_then(|ttl| self.schedule_expiry(id, ttl));
            state.entries.push_back(Entry {
                record: record.clone(),
                timer,
            });

            let mut evicted = Vec::new();
            while state.entries.len() > self.shared.capacity {
                if let Some(mut oldest) = state.entries.pop_front() {
                    oldest.cancel_timer();
                    evicted.push(oldest.record.id);
                }
            }

            (record, evicted)
        };

        debug!(alert_id = %record.id, kind = ?record.kind, "alert pushed");
        let id = record.id;
        self.shared.emit(AlertEvent::Added(record));
        for evicted_id in evicted {
            debug!(alert_id = %evicted_id, "alert evicted, queue full");
            self.shared.emit(AlertEvent::Evicted(evicted_id));
        }

        id
    }

    fn schedule_expiry(&self, id: AlertId, ttl: Duration) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(alert_id = %id, "no async runtime, alert will not auto-expire");
                return None;
            }
        };

        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        Some(runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(shared) = shared.upgrade() {
                shared.expire(id);
            }
        }))
    }

    /// Remove an alert before it expires.
    ///
    /// Returns `false` if it is already gone (dismissed, expired or evicted).
    pub fn dismiss(&self, id: AlertId) -> bool {
        match self.shared.remove(id) {
            Some(mut entry) => {
                entry.cancel_timer();
                self.shared.emit(AlertEvent::Dismissed(id));
                true
            }
            None => false,
        }
    }

    /// Remove every alert and cancel all pending expiries.
    pub fn clear(&self) {
        let drained: Vec<Entry> = self.shared.lock().entries.drain(..).collect();
        for mut entry in drained {
            entry.cancel_timer();
        }
        self.shared.emit(AlertEvent::Cleared);
    }

    /// Snapshot of current alerts, oldest first.
    pub fn list(&self) -> Vec<AlertRecord> {
        self.shared
            .lock()
            .entries
            .iter()
            .map(|entry| entry.record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive every subsequent queue change.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.shared.events.subscribe()
    }
}

impl fmt::Debug for AlertQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertQueue")
            .field("capacity", &self.shared.capacity)
            .field("len", &self.len())
            .finish()
    }
}
