//! Retrying block fetcher over the RPC provider.
//!
//! Transport failures are retried with a linear-ramp backoff of
//! `polling_interval × attempt × 2`. `NotFound` from a by-number
//! fetch is passed through verbatim (the head simply is not there
//! yet); from a by-hash fetch it gets its own small budget, since a
//! node answering a reorg may not have synced the hash yet.

use crate::{
    errors::MonitorError,
    provider::{Provider, ProviderError},
    types::{BlockHash, SealedBlock},
};
use std::{sync::Arc, time::Duration};
use tracing::warn;

/// Transport-failure budget for both fetch paths.
const MAX_ERR_ATTEMPTS: u32 = 10;

/// Not-found budget for by-hash fetches.
const MAX_NOT_FOUND_ATTEMPTS: u32 = 4;

pub(crate) struct BlockFetcher {
    provider: Arc<dyn Provider>,
    polling_interval: Duration,
}

impl BlockFetcher {
    pub(crate) fn new(provider: Arc<dyn Provider>, polling_interval: Duration) -> Self {
        Self { provider, polling_interval }
    }

    /// Fetches a block by number (`None` = latest).
    ///
    /// # Errors
    ///
    /// Propagates `NotFound` immediately; any other provider error is
    /// retried up to [`MAX_ERR_ATTEMPTS`] times before surfacing as
    /// [`MonitorError::MaxAttempts`] wrapping the last error.
    pub(crate) async fn by_number(
        &self,
        number: Option<u64>,
    ) -> Result<Arc<SealedBlock>, MonitorError> {
        let mut err_attempts: u32 = 0;

        loop {
            match self.provider.block_by_number(number).await {
                Ok(block) => return Ok(block),
                Err(ProviderError::NotFound) => return Err(ProviderError::NotFound.into()),
                Err(err) => {
                    err_attempts += 1;
                    if err_attempts >= MAX_ERR_ATTEMPTS {
                        warn!(
                            attempts = err_attempts,
                            block = ?number,
                            error = %err,
                            "fetch by number hit max attempts"
                        );
                        return Err(MonitorError::MaxAttempts(err));
                    }
                    warn!(block = ?number, error = %err, "fetch by number failed, retrying");
                    tokio::time::sleep(self.backoff(err_attempts)).await;
                }
            }
        }
    }

    /// Fetches a block by hash.
    ///
    /// # Errors
    ///
    /// `NotFound` is retried up to [`MAX_NOT_FOUND_ATTEMPTS`] times
    /// (the node may still be syncing toward this hash) before being
    /// surfaced; transport errors follow the by-number budget.
    pub(crate) async fn by_hash(
        &self,
        hash: BlockHash,
    ) -> Result<Arc<SealedBlock>, MonitorError> {
        let mut not_found_attempts: u32 = 0;
        let mut err_attempts: u32 = 0;

        loop {
            match self.provider.block_by_hash(hash).await {
                Ok(block) => return Ok(block),
                Err(ProviderError::NotFound) => {
                    not_found_attempts += 1;
                    if not_found_attempts >= MAX_NOT_FOUND_ATTEMPTS {
                        return Err(ProviderError::NotFound.into());
                    }
                    tokio::time::sleep(self.backoff(not_found_attempts)).await;
                }
                Err(err) => {
                    err_attempts += 1;
                    if err_attempts >= MAX_ERR_ATTEMPTS {
                        warn!(
                            attempts = err_attempts,
                            error = %err,
                            "fetch by hash hit max attempts"
                        );
                        return Err(MonitorError::MaxAttempts(err));
                    }
                    warn!(error = %err, "fetch by hash failed, retrying");
                    tokio::time::sleep(self.backoff(err_attempts)).await;
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.polling_interval * attempt * 2
    }
}
