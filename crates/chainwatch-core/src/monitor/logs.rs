//! Log attachment and retention-wide backfill.
//!
//! A block's logs are fetched by block hash so a reorg cannot hand us
//! another fork's logs. An empty result is only trusted when the
//! block's bloom filter is zero; otherwise the node is assumed to be
//! lagging its own head and the block stays pending for the backfill
//! sweep. Removed blocks are never fetched — their logs may already be
//! gone from the node.

use super::ChainEvent;
use crate::{
    chain::Chain,
    provider::Provider,
    types::{BlockEvent, TopicHash, TrackedBlock},
};
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) struct LogAttacher {
    provider: Arc<dyn Provider>,
    topics: Vec<TopicHash>,
}

impl LogAttacher {
    pub(crate) fn new(provider: Arc<dyn Provider>, topics: Vec<TopicHash>) -> Self {
        Self { provider, topics }
    }

    /// Attaches logs to every Added entry of a batch that does not
    /// have them yet. Failures leave the entry pending; they are
    /// retried by [`backfill`](Self::backfill).
    pub(crate) async fn attach(&self, events: &[ChainEvent]) {
        for entry in events {
            if entry.event == BlockEvent::Removed {
                continue;
            }
            if entry.block.is_complete() {
                continue;
            }
            self.attach_one(&entry.block).await;
        }
    }

    /// Walks retention newest-to-oldest and retries attachment on any
    /// pending block. Per-block failures are logged, never fatal;
    /// a block that keeps failing stays pending until a later sweep
    /// succeeds or it ages out of retention.
    pub(crate) async fn backfill(&self, chain: &Chain) {
        let blocks = chain.blocks();
        for block in blocks.iter().rev() {
            if block.is_complete() {
                continue;
            }
            self.attach_one(block).await;
            if block.is_complete() {
                info!(
                    number = block.number(),
                    hash = %hex::encode(block.hash()),
                    "log backfill succeeded"
                );
            }
        }
    }

    async fn attach_one(&self, block: &Arc<TrackedBlock>) {
        match self.provider.logs_by_block_hash(block.hash(), &self.topics).await {
            Ok(logs) => {
                // An empty list contradicting a non-zero bloom means
                // the node has not indexed this block yet.
                if !logs.is_empty() || !block.sealed().has_nonzero_bloom() {
                    debug!(number = block.number(), logs = logs.len(), "logs attached");
                    block.attach_logs(logs);
                    return;
                }
                block.mark_pending();
                info!(
                    number = block.number(),
                    hash = %hex::encode(block.hash()),
                    "empty logs with non-zero bloom, marking block for backfill"
                );
            }
            Err(err) => {
                block.mark_pending();
                info!(
                    number = block.number(),
                    hash = %hex::encode(block.hash()),
                    error = %err,
                    "get logs failed, marking block for backfill"
                );
            }
        }
    }
}
