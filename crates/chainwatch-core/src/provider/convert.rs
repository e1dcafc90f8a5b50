//! Hex and JSON decoding for JSON-RPC payloads.
//!
//! Ethereum nodes encode quantities as `0x`-prefixed, minimally
//! padded hex and byte strings as `0x`-prefixed, fully padded hex.
//! Everything here returns [`ProviderError::InvalidResponse`] on
//! malformed input so callers can propagate with `?`.

use crate::{
    provider::ProviderError,
    types::{LogRecord, SealedBlock},
};
use serde_json::Value;
use std::sync::Arc;

/// Byte length of an Ethereum logs bloom.
const BLOOM_LEN: usize = 256;

/// Decodes a hex string into a fixed-size byte array, with or without
/// the `0x` prefix.
pub fn hex_to_array<const N: usize>(hex: &str) -> Result<[u8; N], ProviderError> {
    let stripped = hex.strip_prefix("0x").unwrap_or(hex);
    if stripped.len() != N * 2 {
        return Err(invalid(format!("expected {} hex chars, got {}", N * 2, stripped.len())));
    }
    let mut array = [0u8; N];
    hex::decode_to_slice(stripped, &mut array)
        .map_err(|e| invalid(format!("bad hex string: {e}")))?;
    Ok(array)
}

/// Decodes a `0x`-prefixed quantity into a `u64`.
pub fn hex_to_u64(hex: &str) -> Result<u64, ProviderError> {
    let stripped = hex.strip_prefix("0x").unwrap_or(hex);
    if stripped.is_empty() {
        return Err(invalid("empty quantity".to_string()));
    }
    u64::from_str_radix(stripped, 16).map_err(|e| invalid(format!("bad quantity: {e}")))
}

/// Decodes a variable-length `0x`-prefixed byte string.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, ProviderError> {
    let stripped = hex.strip_prefix("0x").unwrap_or(hex);
    hex::decode(stripped).map_err(|e| invalid(format!("bad hex bytes: {e}")))
}

/// Formats a `u64` as a minimally padded `0x` quantity.
#[must_use]
pub fn u64_to_hex(value: u64) -> String {
    format!("0x{value:x}")
}

/// Formats a byte slice as `0x`-prefixed hex.
#[must_use]
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decodes an `eth_getBlockBy*` result object into a [`SealedBlock`].
///
/// The block is expected to carry transaction *hashes* (the monitor
/// always requests blocks with `full_transactions = false`).
pub fn block_from_json(value: &Value) -> Result<SealedBlock, ProviderError> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid("block is not a JSON object".to_string()))?;

    let hash = hex_to_array::<32>(str_field(obj, "hash")?)?;
    let parent_hash = hex_to_array::<32>(str_field(obj, "parentHash")?)?;
    let number = hex_to_u64(str_field(obj, "number")?)?;
    let timestamp = hex_to_u64(str_field(obj, "timestamp")?)?;

    let logs_bloom = match obj.get("logsBloom").and_then(Value::as_str) {
        Some(bloom_hex) => {
            let bloom = hex_to_bytes(bloom_hex)?;
            if bloom.len() != BLOOM_LEN {
                return Err(invalid(format!("logs bloom is {} bytes", bloom.len())));
            }
            bloom
        }
        // Some test chains omit the bloom; treat as "no logs".
        None => vec![0u8; BLOOM_LEN],
    };

    let transactions = match obj.get("transactions") {
        Some(Value::Array(txns)) => txns
            .iter()
            .map(|txn| match txn {
                Value::String(hash) => hex_to_array::<32>(hash),
                // A node answering with full transaction objects still
                // exposes the hash inside each object.
                Value::Object(tx_obj) => {
                    let hash = tx_obj
                        .get("hash")
                        .and_then(Value::as_str)
                        .ok_or_else(|| invalid("transaction without hash".to_string()))?;
                    hex_to_array::<32>(hash)
                }
                _ => Err(invalid("unexpected transaction entry".to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(invalid("transactions is not an array".to_string())),
        None => Vec::new(),
    };

    Ok(SealedBlock {
        hash,
        number,
        parent_hash,
        timestamp,
        logs_bloom: Arc::new(logs_bloom),
        transactions,
    })
}

/// Decodes an `eth_getLogs` result array into [`LogRecord`]s.
pub fn logs_from_json(value: &Value) -> Result<Vec<LogRecord>, ProviderError> {
    let entries = value
        .as_array()
        .ok_or_else(|| invalid("logs result is not an array".to_string()))?;
    entries.iter().map(log_from_json).collect()
}

fn log_from_json(value: &Value) -> Result<LogRecord, ProviderError> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid("log is not a JSON object".to_string()))?;

    let mut topics = [None; 4];
    if let Some(Value::Array(raw_topics)) = obj.get("topics") {
        if raw_topics.len() > 4 {
            return Err(invalid(format!("log has {} topics", raw_topics.len())));
        }
        for (slot, topic) in topics.iter_mut().zip(raw_topics) {
            let topic = topic
                .as_str()
                .ok_or_else(|| invalid("topic is not a string".to_string()))?;
            *slot = Some(hex_to_array::<32>(topic)?);
        }
    }

    Ok(LogRecord {
        address: hex_to_array::<20>(str_field(obj, "address")?)?,
        topics,
        data: obj
            .get("data")
            .and_then(Value::as_str)
            .map(hex_to_bytes)
            .transpose()?
            .unwrap_or_default(),
        block_hash: hex_to_array::<32>(str_field(obj, "blockHash")?)?,
        transaction_hash: hex_to_array::<32>(str_field(obj, "transactionHash")?)?,
        transaction_index: obj
            .get("transactionIndex")
            .and_then(Value::as_str)
            .map(hex_to_u64)
            .transpose()?
            .unwrap_or_default() as u32,
        log_index: obj
            .get("logIndex")
            .and_then(Value::as_str)
            .map(hex_to_u64)
            .transpose()?
            .unwrap_or_default() as u32,
        removed: obj.get("removed").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn str_field<'a>(
    obj: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<&'a str, ProviderError> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("missing field {key}")))
}

fn invalid(message: String) -> ProviderError {
    ProviderError::InvalidResponse(message)
}
