//! Core data types shared across the monitor.
//!
//! Chain quantities use the raw representations the JSON-RPC codec
//! produces: fixed-width byte arrays for hashes and addresses, `u64`
//! block numbers, and an `Arc`'d byte vector for the 256-byte logs
//! bloom so blocks can be shared cheaply between the cache, the
//! publish queue, and subscriber snapshots.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// 32-byte block hash.
pub type BlockHash = [u8; 32];

/// 32-byte transaction hash.
pub type TxHash = [u8; 32];

/// 32-byte log topic hash.
pub type TopicHash = [u8; 32];

/// 20-byte account address.
pub type Address = [u8; 20];

/// Immutable raw block as returned by the provider.
///
/// Only the fields the monitor consumes are retained; transactions are
/// kept as hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedBlock {
    pub hash: BlockHash,
    pub number: u64,
    pub parent_hash: BlockHash,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// 256-byte logs bloom; all zero means the block carries no logs.
    pub logs_bloom: Arc<Vec<u8>>,
    pub transactions: Vec<TxHash>,
}

impl SealedBlock {
    /// Returns true when the bloom filter advertises at least one log.
    #[must_use]
    pub fn has_nonzero_bloom(&self) -> bool {
        self.logs_bloom.iter().any(|b| *b != 0)
    }
}

/// A single event log attached to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub address: Address,
    pub topics: [Option<TopicHash>; 4],
    pub data: Vec<u8>,
    pub block_hash: BlockHash,
    pub transaction_hash: TxHash,
    pub transaction_index: u32,
    pub log_index: u32,
    pub removed: bool,
}

/// Whether a block entered or left the canonical chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockEvent {
    Added,
    Removed,
}

/// Published snapshot of one chain edit.
///
/// Removed entries always have `ok == true` and an empty log list;
/// their logs may never be available from the node again.
#[derive(Debug, Clone)]
pub struct BlockUpdate {
    pub event: BlockEvent,
    pub block: Arc<SealedBlock>,
    pub logs: Vec<LogRecord>,
    /// True when log attachment is complete or was not required.
    pub ok: bool,
}

/// Ordered edit script over the canonical chain: Removed entries
/// (newest-first pop order) followed by Added entries
/// (ancestor-first).
pub type BlockBatch = Vec<BlockUpdate>;

/// Location of a transaction within the retained chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionLocation {
    pub block_hash: BlockHash,
    pub block_number: u64,
    pub index: u32,
}

/// Chain entry pairing a sealed block with its log-attachment state.
///
/// Entries are `Arc`-shared between the chain cache and batches
/// waiting in the publish queue, so a backfill that lands while a
/// batch trails behind head is reflected when the batch is finally
/// snapshotted for broadcast.
#[derive(Debug)]
pub struct TrackedBlock {
    block: Arc<SealedBlock>,
    attachment: RwLock<Attachment>,
}

#[derive(Debug, Default)]
struct Attachment {
    logs: Option<Vec<LogRecord>>,
    ok: bool,
}

impl TrackedBlock {
    #[must_use]
    pub fn new(block: Arc<SealedBlock>) -> Self {
        Self { block, attachment: RwLock::new(Attachment::default()) }
    }

    /// Creates an entry whose log attachment is already complete, used
    /// when logs are disabled or when seeding the chain.
    #[must_use]
    pub fn new_complete(block: Arc<SealedBlock>) -> Self {
        Self {
            block,
            attachment: RwLock::new(Attachment { logs: None, ok: true }),
        }
    }

    #[must_use]
    pub fn sealed(&self) -> &Arc<SealedBlock> {
        &self.block
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        self.block.number
    }

    #[must_use]
    pub fn hash(&self) -> BlockHash {
        self.block.hash
    }

    #[must_use]
    pub fn parent_hash(&self) -> BlockHash {
        self.block.parent_hash
    }

    /// True when log attachment finished (or was never required).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.attachment.read().unwrap_or_else(PoisonError::into_inner).ok
    }

    /// Stores the fetched log list and marks attachment complete.
    pub fn attach_logs(&self, logs: Vec<LogRecord>) {
        let mut state = self.attachment.write().unwrap_or_else(PoisonError::into_inner);
        state.logs = Some(logs);
        state.ok = true;
    }

    /// Clears any partial logs and leaves the block pending backfill.
    pub fn mark_pending(&self) {
        let mut state = self.attachment.write().unwrap_or_else(PoisonError::into_inner);
        state.logs = None;
        state.ok = false;
    }

    /// Clears logs and marks the block complete; used when log
    /// attachment is disabled so subscribers see an unambiguous shape.
    pub fn mark_complete_without_logs(&self) {
        let mut state = self.attachment.write().unwrap_or_else(PoisonError::into_inner);
        state.logs = None;
        state.ok = true;
    }

    /// Current log list; empty when none were attached.
    #[must_use]
    pub fn logs(&self) -> Vec<LogRecord> {
        self.attachment
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .logs
            .clone()
            .unwrap_or_default()
    }

    /// Immutable snapshot for publication. Removed snapshots never
    /// carry logs and are always complete.
    #[must_use]
    pub fn snapshot(&self, event: BlockEvent) -> BlockUpdate {
        match event {
            BlockEvent::Removed => BlockUpdate {
                event,
                block: Arc::clone(&self.block),
                logs: Vec::new(),
                ok: true,
            },
            BlockEvent::Added => {
                let state = self.attachment.read().unwrap_or_else(PoisonError::into_inner);
                BlockUpdate {
                    event,
                    block: Arc::clone(&self.block),
                    logs: state.logs.clone().unwrap_or_default(),
                    ok: state.ok,
                }
            }
        }
    }
}
