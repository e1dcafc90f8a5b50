//! Provider error taxonomy.

use thiserror::Error;

/// Errors surfaced by an RPC provider.
///
/// `NotFound` is a sentinel rather than a failure: it means the
/// requested block or hash is not available *yet*, and the monitor
/// treats it as "try again after a normal poll interval".
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// The requested block or hash is not (yet) known to the node.
    #[error("not found")]
    NotFound,

    /// Request exceeded the configured per-call deadline.
    #[error("request timeout")]
    Timeout,

    /// Failed to reach the endpoint. The message is sanitized and
    /// never contains the endpoint URL.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-success HTTP status from the endpoint.
    #[error("http error: status {0}")]
    HttpError(u16, String),

    /// JSON-RPC error object returned by the node.
    #[error("rpc error {0}: {1}")]
    RpcError(i32, String),

    /// Response could not be decoded into the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// True for the "not available yet" sentinel.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// True when retrying the same call may succeed: timeouts,
    /// connection failures, 5xx/429 statuses, and server-side RPC
    /// errors. Malformed responses and client-side RPC errors are
    /// not transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::HttpError(status, _) => (500..=599).contains(status) || *status == 429,
            Self::RpcError(code, _) => !(-32602..=-32600).contains(code) && *code != -32700,
            Self::NotFound | Self::InvalidResponse(_) => false,
        }
    }
}
