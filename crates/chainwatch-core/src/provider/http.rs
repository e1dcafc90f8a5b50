//! JSON-RPC 2.0 HTTP provider backed by reqwest.

use crate::{
    provider::{convert, Provider, ProviderError},
    types::{BlockHash, LogRecord, SealedBlock, TopicHash},
};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::trace;

/// HTTP JSON-RPC client for a single Ethereum-compatible endpoint.
///
/// The client is intentionally single-shot: it performs no retries of
/// its own, leaving retry budgets and backoff to the monitor's
/// fetcher. Each call is bounded by the configured per-call timeout.
pub struct HttpProvider {
    client: Client,
    url: String,
    timeout: Duration,
    request_id: AtomicU64,
}

impl HttpProvider {
    /// Creates a provider for `url` with the given per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::ConnectionFailed`] if the underlying
    /// HTTP client fails to build.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("chainwatch/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                ProviderError::ConnectionFailed(format!("http client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
            request_id: AtomicU64::new(1),
        })
    }

    /// Sends one JSON-RPC request and returns the `result` value.
    ///
    /// A JSON `null` result is mapped to [`ProviderError::NotFound`].
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        trace!(method, id, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let truncated = match text.get(..256) {
                Some(prefix) => prefix.to_string(),
                None => text,
            };
            return Err(ProviderError::HttpError(status.as_u16(), truncated));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("bad json body: {e}")))?;

        if let Some(error) = envelope.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default() as i32;
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            return Err(ProviderError::RpcError(code, message));
        }

        match envelope.get("result") {
            Some(Value::Null) | None => Err(ProviderError::NotFound),
            Some(result) => Ok(result.clone()),
        }
    }

    /// Maps reqwest transport failures without leaking the endpoint.
    fn map_transport_error(error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            return ProviderError::Timeout;
        }
        let reason = if error.is_connect() {
            "connection refused or unreachable"
        } else if error.is_request() {
            "request failed"
        } else if error.is_body() || error.is_decode() {
            "response body error"
        } else if error.is_redirect() {
            "too many redirects"
        } else {
            "network error"
        };
        ProviderError::ConnectionFailed(reason.to_string())
    }

    fn topics_param(topics: &[TopicHash]) -> Value {
        if topics.is_empty() {
            Value::Null
        } else {
            // A single positional slot matching any of the configured
            // topic hashes, per the eth_getLogs filter format.
            json!([topics.iter().map(|t| convert::bytes_to_hex(t)).collect::<Vec<_>>()])
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn block_by_number(
        &self,
        number: Option<u64>,
    ) -> Result<Arc<SealedBlock>, ProviderError> {
        let tag = match number {
            Some(n) => Value::String(convert::u64_to_hex(n)),
            None => Value::String("latest".to_string()),
        };
        let result = self.request("eth_getBlockByNumber", json!([tag, false])).await?;
        Ok(Arc::new(convert::block_from_json(&result)?))
    }

    async fn block_by_hash(&self, hash: BlockHash) -> Result<Arc<SealedBlock>, ProviderError> {
        let result = self
            .request(
                "eth_getBlockByHash",
                json!([convert::bytes_to_hex(&hash), false]),
            )
            .await?;
        Ok(Arc::new(convert::block_from_json(&result)?))
    }

    async fn logs_by_block_hash(
        &self,
        block_hash: BlockHash,
        topics: &[TopicHash],
    ) -> Result<Vec<LogRecord>, ProviderError> {
        let mut filter = json!({ "blockHash": convert::bytes_to_hex(&block_hash) });
        let topics_param = Self::topics_param(topics);
        if !topics_param.is_null() {
            filter["topics"] = topics_param;
        }

        // An empty log list is a valid result, not NotFound.
        match self.request("eth_getLogs", json!([filter])).await {
            Ok(result) => convert::logs_from_json(&result),
            Err(ProviderError::NotFound) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}
