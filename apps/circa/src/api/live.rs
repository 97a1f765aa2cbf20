//! # Live Channel Registry
//!
//! Tracks websocket subscribers per project and fans change events out to
//! them.
//!
//! - Each subscriber owns a bounded queue (`[live] channel_capacity`)
//! - A full queue drops the event for that subscriber only
//! - A closed queue unregisters the subscriber on the next delivery
//! - Subscribers of project `0` receive every event

use circa_core::{ChangeEvent, NotificationSink, ProjectId, Scope};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

/// Identifies one registered connection.
pub type SubscriberId = u64;

/// Registry of live subscribers, keyed by subscribed project.
#[derive(Debug)]
pub struct LiveRegistry {
    subscribers: Mutex<BTreeMap<ProjectId, BTreeMap<SubscriberId, Sender<ChangeEvent>>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl LiveRegistry {
    /// Create an empty registry. Queues hold up to `capacity` events (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a subscriber for `project`. Returns its id and event queue.
    pub fn register(&self, project: ProjectId) -> (SubscriberId, Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        subscribers.entry(project).or_default().insert(id, tx);
        (id, rx)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unregister(&self, project: ProjectId, id: SubscriberId) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(group) = subscribers.get_mut(&project) {
            group.remove(&id);
            if group.is_empty() {
                subscribers.remove(&project);
            }
        }
    }

    /// Number of registered subscribers across all projects.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(BTreeMap::len)
            .sum()
    }
}

impl Default for LiveRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CHANNEL_CAPACITY)
    }
}

impl NotificationSink for LiveRegistry {
    fn notify(&self, scope: Scope, event: &ChangeEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        for (project, group) in subscribers.iter_mut() {
            if !scope.reaches(*project) {
                continue;
            }
            group.retain(|id, tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        event = "live_queue_full",
                        project = project.0,
                        subscriber = id,
                        op = event.op(),
                        "Live subscriber queue full, event dropped"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        project = project.0,
                        subscriber = id,
                        "Pruned closed subscriber"
                    );
                    false
                }
            });
        }
        subscribers.retain(|_, group| !group.is_empty());
    }
}

// =============================================================================
// TESTS
// =============================================================================
