//! Bounded FIFO of event batches awaiting release.
//!
//! Batches wait here until the trail-behind-head rule allows them to
//! reach subscribers. The queue is keyed by each batch's top block
//! number (its final, newest Added entry) and is only touched from
//! the monitor task.

use super::EventBatch;
use crate::errors::MonitorError;
use std::collections::VecDeque;
use tracing::trace;

pub(crate) struct PublishQueue {
    capacity: usize,
    batches: VecDeque<EventBatch>,
}

impl PublishQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { capacity, batches: VecDeque::new() }
    }

    /// Appends a batch.
    ///
    /// # Errors
    ///
    /// [`MonitorError::QueueFull`] at capacity; the caller treats this
    /// as fatal since the monitor task is the only producer.
    pub(crate) fn enqueue(&mut self, batch: EventBatch) -> Result<(), MonitorError> {
        if batch.is_empty() {
            return Ok(());
        }
        if self.batches.len() >= self.capacity {
            return Err(MonitorError::QueueFull);
        }
        trace!(top = batch_top(&batch), queued = self.batches.len() + 1, "batch enqueued");
        self.batches.push_back(batch);
        Ok(())
    }

    /// Releases batches for broadcast.
    ///
    /// With `max_block_num = None` (trail-behind disabled) the single
    /// oldest batch is released unconditionally. With `Some(m)`, all
    /// leading batches whose top block number is ≤ `m` are released as
    /// one concatenated batch, preserving per-batch and cross-batch
    /// order. Returns `None` when nothing is releasable.
    pub(crate) fn dequeue(&mut self, max_block_num: Option<u64>) -> Option<EventBatch> {
        match max_block_num {
            None => self.batches.pop_front(),
            Some(max) => {
                let mut released: EventBatch = Vec::new();
                while let Some(front) = self.batches.front() {
                    match batch_top(front) {
                        Some(top) if top <= max => {
                            let mut batch = self.batches.pop_front().unwrap_or_default();
                            released.append(&mut batch);
                        }
                        _ => break,
                    }
                }
                if released.is_empty() {
                    None
                } else {
                    Some(released)
                }
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.batches.len()
    }
}

/// Highest block number in a batch: resolvers emit Removed entries
/// first and finish with the newest Added entry, so the last entry is
/// the key.
fn batch_top(batch: &EventBatch) -> Option<u64> {
    batch.last().map(|entry| entry.block.number())
}
