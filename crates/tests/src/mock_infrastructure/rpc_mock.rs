//! Mockito-backed Ethereum JSON-RPC fixtures.
//!
//! Wraps mockito with builders for the three methods the monitor
//! uses, returning well-formed JSON-RPC 2.0 envelopes.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

/// Builder for mock Ethereum RPC responses.
pub struct RpcMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl RpcMockBuilder {
    /// Creates a builder with a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    /// URL of the mock server.
    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Builds a block response object for the given number. Hashes are
    /// tag-based, like the scripted provider's fixtures.
    #[must_use]
    pub fn block_json(number: u64, tag: u8, parent_tag: u8) -> Value {
        json!({
            "hash": format!("0x{}", hex_repeat(tag)),
            "parentHash": format!("0x{}", hex_repeat(parent_tag)),
            "number": format!("0x{number:x}"),
            "timestamp": format!("0x{:x}", 1_700_000_000u64 + number * 12),
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "transactions": [format!("0x{}", hex_repeat(tag))],
        })
    }

    /// Mocks an `eth_getBlockByNumber` request for a specific number.
    pub fn mock_get_block_by_number(&mut self, block_number: u64, response: &Value) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::Regex(format!(
                r#""method"\s*:\s*"eth_getBlockByNumber".*"params"\s*:\s*\["0x{block_number:x}""#
            )))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(envelope(response).to_string())
            .create();
        self.mocks.push(mock);
        self
    }

    /// Mocks `eth_getBlockByNumber` with the `latest` tag.
    pub fn mock_get_latest_block(&mut self, response: &Value) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::Regex(
                r#""method"\s*:\s*"eth_getBlockByNumber".*"params"\s*:\s*\["latest""#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(envelope(response).to_string())
            .create();
        self.mocks.push(mock);
        self
    }

    /// Mocks an `eth_getBlockByHash` request.
    pub fn mock_get_block_by_hash(&mut self, hash_tag: u8, response: &Value) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::Regex(format!(
                r#""method"\s*:\s*"eth_getBlockByHash".*"params"\s*:\s*\["0x{}""#,
                hex_repeat(hash_tag)
            )))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(envelope(response).to_string())
            .create();
        self.mocks.push(mock);
        self
    }

    /// Mocks an `eth_getLogs` request.
    pub fn mock_get_logs(&mut self, logs: &[Value]) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#""method"\s*:\s*"eth_getLogs""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(envelope(&json!(logs)).to_string())
            .create();
        self.mocks.push(mock);
        self
    }

    /// Mocks a `null` result for a method (block not found).
    pub fn mock_null_result(&mut self, method: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#)))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(envelope(&Value::Null).to_string())
            .create();
        self.mocks.push(mock);
        self
    }

    /// Mocks a JSON-RPC error response.
    pub fn mock_rpc_error(&mut self, method: &str, code: i32, message: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#)))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": code, "message": message }
                })
                .to_string(),
            )
            .create();
        self.mocks.push(mock);
        self
    }

    /// Mocks a 500 for any request.
    pub fn mock_server_error(&mut self) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .with_status(500)
            .with_body("Internal Server Error")
            .create();
        self.mocks.push(mock);
        self
    }
}

fn envelope(result: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    })
}

fn hex_repeat(tag: u8) -> String {
    format!("{tag:02x}").repeat(32)
}
