//! Canonical-chain cache.
//!
//! [`Chain`] holds the locally believed canonical suffix of the
//! chain, newest at the tail. Adjacent entries are always linked by
//! parent hash and numbered consecutively; pushes that would break
//! either invariant are rejected so the caller can run reorg repair.
//! When retention overflows, the oldest entry is evicted.

use crate::{
    errors::MonitorError,
    types::{BlockHash, SealedBlock, TrackedBlock, TransactionLocation, TxHash},
};
use std::{
    collections::VecDeque,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::{debug, trace};

/// Ordered retention of recent canonical blocks.
///
/// All methods are thread-safe; a single `RwLock` guards the suffix.
/// Iteration APIs copy the `Arc` slice so callers never hold the lock.
pub struct Chain {
    inner: RwLock<ChainInner>,
    retention: usize,
    bootstrap: bool,
}

struct ChainInner {
    blocks: VecDeque<Arc<TrackedBlock>>,
    seeded: bool,
}

impl Chain {
    /// Creates a chain retaining at most `retention` blocks. In
    /// bootstrap mode the chain starts unseeded and the monitor
    /// refuses to run until [`seed`](Self::seed) is called.
    #[must_use]
    pub fn new(retention: usize, bootstrap: bool) -> Self {
        Self {
            inner: RwLock::new(ChainInner {
                blocks: VecDeque::new(),
                seeded: !bootstrap,
            }),
            retention,
            bootstrap,
        }
    }

    /// Maximum number of retained blocks.
    #[must_use]
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// True once the chain may be used by the monitor. Chains not in
    /// bootstrap mode are seeded from construction.
    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.read().seeded
    }

    /// Appends a block to the tail.
    ///
    /// The first push onto an empty chain establishes the anchor
    /// unconditionally. Evicts the oldest entry when the length would
    /// exceed retention.
    ///
    /// # Errors
    ///
    /// [`MonitorError::UnexpectedBlockNumber`] when the block does not
    /// follow the head's number, [`MonitorError::UnexpectedParentHash`]
    /// when it does not link to the head's hash. Both signal a reorg
    /// condition to the caller; the chain is left unchanged.
    pub fn push(&self, block: Arc<TrackedBlock>) -> Result<(), MonitorError> {
        let mut inner = self.write();

        if let Some(head) = inner.blocks.back() {
            let expected = head.number() + 1;
            if block.number() != expected {
                return Err(MonitorError::UnexpectedBlockNumber {
                    expected,
                    actual: block.number(),
                });
            }
            if block.parent_hash() != head.hash() {
                return Err(MonitorError::UnexpectedParentHash { number: block.number() });
            }
        }

        trace!(number = block.number(), "chain push");
        inner.blocks.push_back(block);

        if inner.blocks.len() > self.retention {
            if let Some(evicted) = inner.blocks.pop_front() {
                trace!(number = evicted.number(), "retention eviction");
            }
        }
        Ok(())
    }

    /// Removes and returns the newest entry, or `None` when empty.
    pub fn pop(&self) -> Option<Arc<TrackedBlock>> {
        self.write().blocks.pop_back()
    }

    /// Newest retained block (the chain tip).
    #[must_use]
    pub fn head(&self) -> Option<Arc<TrackedBlock>> {
        self.read().blocks.back().cloned()
    }

    /// Oldest retained block.
    #[must_use]
    pub fn tail(&self) -> Option<Arc<TrackedBlock>> {
        self.read().blocks.front().cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().blocks.is_empty()
    }

    /// Copies the retained suffix, oldest first.
    #[must_use]
    pub fn blocks(&self) -> Vec<Arc<TrackedBlock>> {
        self.read().blocks.iter().cloned().collect()
    }

    /// The block `depth` entries behind the head, if retention is deep
    /// enough. `depth = 0` is the head itself.
    #[must_use]
    pub fn block_at_depth(&self, depth: usize) -> Option<Arc<TrackedBlock>> {
        let inner = self.read();
        let len = inner.blocks.len();
        if len < depth + 1 {
            return None;
        }
        inner.blocks.get(len - depth - 1).cloned()
    }

    /// Linear scan of retention for a block hash.
    #[must_use]
    pub fn get_block(&self, hash: BlockHash) -> Option<Arc<TrackedBlock>> {
        self.read().blocks.iter().find(|b| b.hash() == hash).cloned()
    }

    /// Linear scan of retention for a transaction hash. Only canonical
    /// (retained) blocks are searched, so a transaction removed by a
    /// reorg is not reported.
    #[must_use]
    pub fn find_transaction(&self, hash: TxHash) -> Option<TransactionLocation> {
        let inner = self.read();
        for block in &inner.blocks {
            if let Some(index) = block.sealed().transactions.iter().position(|t| *t == hash) {
                return Some(TransactionLocation {
                    block_hash: block.hash(),
                    block_number: block.number(),
                    index: index as u32,
                });
            }
        }
        None
    }

    /// Mean of timestamp deltas across retention, in seconds. Returns
    /// `0.0` with fewer than two blocks.
    #[must_use]
    pub fn average_block_time(&self) -> f64 {
        let inner = self.read();
        let n = inner.blocks.len();
        if n < 2 {
            return 0.0;
        }
        let first = inner.blocks[0].sealed().timestamp;
        let last = inner.blocks[n - 1].sealed().timestamp;
        last.saturating_sub(first) as f64 / (n - 1) as f64
    }

    /// Installs a pre-populated suffix and marks the chain seeded.
    /// Blocks are treated as log-complete; older entries beyond
    /// retention are dropped.
    ///
    /// # Errors
    ///
    /// The same invariant errors as [`push`](Self::push) when the
    /// seed blocks are not contiguous.
    pub fn seed(&self, blocks: Vec<Arc<SealedBlock>>) -> Result<(), MonitorError> {
        {
            let mut inner = self.write();
            inner.blocks.clear();
            inner.seeded = true;
        }
        for sealed in blocks {
            self.push(Arc::new(TrackedBlock::new_complete(sealed)))?;
        }
        debug!(len = self.len(), bootstrap = self.bootstrap, "chain seeded");
        Ok(())
    }

    /// Truncates retention to the head entry only. Useful for tests;
    /// almost never the right call in an application.
    pub fn purge_history(&self) {
        let mut inner = self.write();
        let len = inner.blocks.len();
        if len > 1 {
            inner.blocks.drain(..len - 1);
            debug!(purged = len - 1, "chain history purged");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
