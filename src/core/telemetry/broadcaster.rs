//! Fan-out of cycle snapshots to live subscribers.
//!
//! Each subscriber owns a small bounded queue. Publishing never waits on a
//! subscriber: a full queue loses that one snapshot, a closed queue is
//! removed from the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::models::Snapshot;

pub type SubscriberId = u64;

const DEFAULT_BUFFER: usize = 8;

/// Registry of subscriber queues.
///
/// Add, remove and point-in-time listing are the only operations; the publish
/// path works on a listing, so concurrent changes apply from the next publish.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<SubscriberId, mpsc::Sender<Arc<Snapshot>>>>,
}

impl SubscriberRegistry {
    pub fn add(&self, sender: mpsc::Sender<Arc<Snapshot>>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(id, sender);
        id
    }

    /// Returns whether the id was still registered
    pub fn remove(&self, id: SubscriberId) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    pub fn listing(&self) -> Vec<(SubscriberId, mpsc::Sender<Arc<Snapshot>>)> {
        self.entries
            .lock()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Receiving end handed to a subscriber
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<Snapshot>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next snapshot, or `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.try_recv().ok()
    }
}

/// Per-publish delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Subscribers whose queue was full; they miss this snapshot only
    pub lagged: usize,
    /// Closed subscribers removed during this publish
    pub pruned: usize,
}

/// Cheap to clone; all clones share one registry
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    buffer: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(SubscriberRegistry::default()),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.registry.add(tx);
        log::debug!("Subscriber {} registered", id);
        Subscription { id, rx }
    }

    /// Safe to call more than once and from any task
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.registry.remove(id) {
            log::debug!("Subscriber {} removed", id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Hand the same snapshot to every subscriber registered right now.
    pub fn publish(&self, snapshot: Arc<Snapshot>) -> PublishReport {
        let mut report = PublishReport::default();

        for (id, sender) in self.registry.listing() {
            match sender.try_send(Arc::clone(&snapshot)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    log::debug!("Subscriber {} is behind, skipping snapshot", id);
                    report.lagged += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    if self.registry.remove(id) {
                        report.pruned += 1;
                    }
                }
            }
        }

        if report.pruned > 0 {
            log::debug!("Pruned {} closed subscriber(s)", report.pruned);
        }

        report
    }
}
