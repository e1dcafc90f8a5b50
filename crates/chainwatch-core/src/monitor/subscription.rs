//! Subscriber registry and subscription handles.

use super::channel::WatermarkChannel;
use crate::types::BlockBatch;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};
use tracing::debug;

/// Backlog at which a slow subscriber is first warned about.
const SOFT_WATERMARK: usize = 100;

/// Backlog at which the oldest undelivered batch is shed.
const HARD_WATERMARK: usize = 5000;

/// Thread-safe subscriber registry.
///
/// Uses its own lock, separate from the chain's, so broadcasts never
/// contend with chain reads. Sends are non-blocking; per-subscriber
/// backpressure is handled inside [`WatermarkChannel`].
pub(crate) struct SubscriberSet {
    entries: RwLock<Vec<SubscriberEntry>>,
    next_id: AtomicU64,
}

struct SubscriberEntry {
    id: u64,
    channel: Arc<WatermarkChannel<BlockBatch>>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// Registers a new subscriber and returns its handle.
    pub(crate) fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let channel = Arc::new(WatermarkChannel::new(SOFT_WATERMARK, HARD_WATERMARK));

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SubscriberEntry { id, channel: Arc::clone(&channel) });

        debug!(subscriber = id, "subscribed");
        Subscription {
            id,
            channel,
            set: Arc::clone(self),
            unsubscribed: AtomicBool::new(false),
        }
    }

    /// Forwards a batch to every subscriber without blocking.
    pub(crate) fn broadcast(&self, batch: &BlockBatch) {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.iter() {
            entry.channel.send(batch.clone());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn remove(&self, id: u64) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|entry| entry.id != id);
    }
}

/// Handle to an active subscription.
///
/// Receives ordered [`BlockBatch`] values via [`recv`](Self::recv).
/// [`unsubscribe`](Self::unsubscribe) is idempotent and also runs on
/// drop; already-delivered batches stay receivable until drained.
pub struct Subscription {
    id: u64,
    channel: Arc<WatermarkChannel<BlockBatch>>,
    set: Arc<SubscriberSet>,
    unsubscribed: AtomicBool,
}

impl Subscription {
    /// Receives the next batch, or `None` once unsubscribed and
    /// drained.
    pub async fn recv(&self) -> Option<BlockBatch> {
        self.channel.recv().await
    }

    /// Closes the channel and removes this subscriber from the
    /// registry. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if self.unsubscribed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.channel.close();
        self.set.remove(self.id);
        debug!(subscriber = self.id, "unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
