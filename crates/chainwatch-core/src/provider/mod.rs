//! RPC provider abstraction and the HTTP JSON-RPC implementation.
//!
//! The monitor consumes the [`Provider`] trait; production code uses
//! [`HttpProvider`], tests substitute scripted implementations.

pub mod convert;
mod errors;
mod http;

pub use errors::ProviderError;
pub use http::HttpProvider;

use crate::types::{BlockHash, LogRecord, SealedBlock, TopicHash};
use async_trait::async_trait;
use std::sync::Arc;

/// Minimal upstream surface the monitor depends on.
///
/// All methods apply the provider's configured per-call timeout.
/// A missing block or hash is reported as [`ProviderError::NotFound`],
/// which callers treat as "not available yet" rather than a failure.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Fetches a block by number; `None` requests the latest block.
    async fn block_by_number(
        &self,
        number: Option<u64>,
    ) -> Result<Arc<SealedBlock>, ProviderError>;

    /// Fetches a block by hash.
    async fn block_by_hash(&self, hash: BlockHash) -> Result<Arc<SealedBlock>, ProviderError>;

    /// Fetches the logs of a single block, optionally restricted to
    /// the given topic set (empty slice = all logs).
    async fn logs_by_block_hash(
        &self,
        block_hash: BlockHash,
        topics: &[TopicHash],
    ) -> Result<Vec<LogRecord>, ProviderError>;
}
