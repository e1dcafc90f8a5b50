//! Monitor error taxonomy.

use crate::provider::ProviderError;
use thiserror::Error;

/// Errors raised by the chain monitor.
///
/// The run loop recovers from everything except [`Fatal`]: transient
/// provider failures retry on the next poll, and cache invariant
/// violations trigger reorg repair. [`Fatal`] exits
/// [`run`](crate::monitor::Monitor::run) with the cause attached.
///
/// [`Fatal`]: MonitorError::Fatal
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MonitorError {
    /// Unrecoverable condition; the monitor stops.
    #[error("fatal error, stopping")]
    Fatal(#[source] Box<MonitorError>),

    /// A second concurrent `run` was attempted.
    #[error("monitor is already running")]
    AlreadyRunning,

    /// Bootstrap mode requires the chain to be seeded before `run`.
    #[error("monitor is in bootstrap mode and must be seeded before run")]
    NotBootstrapped,

    /// The chain is reorganizing; informational, surfaced through the
    /// event stream rather than as a failure.
    #[error("block reorg")]
    Reorg,

    /// A pushed block does not link to the current chain head.
    #[error("unexpected parent hash for block {number}")]
    UnexpectedParentHash { number: u64 },

    /// A pushed block breaks monotonic numbering.
    #[error("unexpected block number {actual}, expected {expected}")]
    UnexpectedBlockNumber { expected: u64, actual: u64 },

    /// The publish queue is at capacity.
    #[error("publish queue is full")]
    QueueFull,

    /// The fetcher exhausted its retry budget.
    #[error("max attempts hit")]
    MaxAttempts(#[source] ProviderError),

    /// A single reorg walk popped the entire retention window without
    /// reconnecting to the provider's chain.
    #[error("reorg exceeded the retention window")]
    ReorgDepthExceeded,

    /// Provider failure; `NotFound` is handled by the loop and never
    /// escapes `run`.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Invalid monitor configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    /// Wraps an error as fatal, terminating the run loop.
    #[must_use]
    pub fn fatal(cause: MonitorError) -> Self {
        Self::Fatal(Box::new(cause))
    }

    /// True when this is the provider's "not available yet" sentinel.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider(err) if err.is_not_found())
    }
}
