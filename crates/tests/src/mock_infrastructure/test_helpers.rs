//! Shared fixtures for monitor scenarios.

use chainwatch_core::{LogRecord, MonitorConfig, SealedBlock};
use std::sync::Arc;

/// Builds a sealed block with a recognizable tag-based hash. The
/// parent hash is `[parent_tag; 32]`, so chains link up when tags are
/// threaded through consecutively. Timestamps are spaced 12 seconds.
pub fn block(number: u64, tag: u8, parent_tag: u8) -> Arc<SealedBlock> {
    block_with_bloom(number, tag, parent_tag, 0x00)
}

/// Like [`block`], with the first bloom byte set to `bloom_byte`.
pub fn block_with_bloom(
    number: u64,
    tag: u8,
    parent_tag: u8,
    bloom_byte: u8,
) -> Arc<SealedBlock> {
    let mut bloom = vec![0u8; 256];
    bloom[0] = bloom_byte;
    Arc::new(SealedBlock {
        hash: [tag; 32],
        number,
        parent_hash: [parent_tag; 32],
        timestamp: 1_700_000_000 + number * 12,
        logs_bloom: Arc::new(bloom),
        transactions: vec![[tag; 32]],
    })
}

/// A log attributed to the block with the given tag.
pub fn log_for_block(tag: u8) -> LogRecord {
    LogRecord {
        address: [tag; 20],
        topics: [Some([tag; 32]), None, None, None],
        data: vec![tag],
        block_hash: [tag; 32],
        transaction_hash: [tag; 32],
        transaction_index: 0,
        log_index: 0,
        removed: false,
    }
}

/// Monitor options tuned for paused-clock tests.
pub fn fast_config() -> MonitorConfig {
    MonitorConfig {
        polling_interval_ms: 10,
        ..MonitorConfig::default()
    }
}
