//! Integration tests for the chainwatch monitor.
//!
//! `mock_infrastructure` provides two levels of fakery: a scripted
//! in-process [`Provider`](chainwatch_core::Provider) for
//! deterministic end-to-end scenarios (driven on tokio's paused
//! clock), and mockito-backed HTTP fixtures for exercising the real
//! JSON-RPC client.

pub mod mock_infrastructure;

#[cfg(test)]
mod monitor_scenarios;
