//! Test doubles for the monitor's upstream.

mod provider_mock;
mod rpc_mock;
mod test_helpers;

pub use provider_mock::{LogResponse, ScriptedProvider};
pub use rpc_mock::RpcMockBuilder;
pub use test_helpers::{block, block_with_bloom, fast_config, log_for_block};
