//! Unbounded channel with soft/hard watermarks.
//!
//! Each subscriber owns one of these. Sends never block the producer:
//! crossing the soft watermark logs a warning (once per excursion),
//! and at the hard watermark the oldest undelivered item is shed so a
//! stalled consumer cannot grow the queue without bound.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::Notify;
use tracing::warn;

pub(crate) struct WatermarkChannel<T> {
    state: Mutex<ChannelState<T>>,
    notify: Notify,
    soft: usize,
    hard: usize,
}

struct ChannelState<T> {
    items: VecDeque<T>,
    closed: bool,
    above_soft: bool,
}

impl<T> WatermarkChannel<T> {
    pub(crate) fn new(soft: usize, hard: usize) -> Self {
        Self {
            state: Mutex::new(ChannelState {
                items: VecDeque::new(),
                closed: false,
                above_soft: false,
            }),
            notify: Notify::new(),
            soft,
            hard,
        }
    }

    /// Enqueues an item. Silently dropped when the channel is closed.
    pub(crate) fn send(&self, item: T) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.items.push_back(item);

            let len = state.items.len();
            if len > self.hard {
                state.items.pop_front();
                warn!(
                    backlog = self.hard,
                    "subscriber past hard watermark, shedding oldest batch"
                );
            } else if len > self.soft {
                if !state.above_soft {
                    state.above_soft = true;
                    warn!(backlog = len, soft = self.soft, "subscriber past soft watermark");
                }
            } else {
                state.above_soft = false;
            }
        }
        self.notify.notify_one();
    }

    /// Receives the next item, waiting if the channel is empty.
    /// Returns `None` once the channel is closed and drained.
    pub(crate) async fn recv(&self) -> Option<T> {
        loop {
            // Register for a wakeup before checking so a send between
            // the check and the await is not lost.
            let notified = self.notify.notified();
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Closes the channel; pending items remain receivable.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
