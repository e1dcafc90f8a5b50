//! # Chainwatch Core
//!
//! Chain-following monitor for Ethereum-compatible JSON-RPC nodes.
//!
//! The monitor maintains a locally cached canonical suffix of the
//! chain, repairs it across reorganizations, optionally attaches
//! event logs to each block, and fans an ordered stream of additions
//! and removals out to subscribers.
//!
//! - **[`monitor`]**: the polling orchestrator — reorg repair, log
//!   attachment and backfill, trail-behind-head publication, and the
//!   subscriber fanout.
//!
//! - **[`chain`]**: the canonical-chain cache with push/pop
//!   semantics, retention eviction, and hash/transaction lookup.
//!
//! - **[`provider`]**: the RPC seam — the [`Provider`] trait consumed
//!   by the engine and the reqwest-backed [`HttpProvider`].
//!
//! - **[`config`]**: monitor options plus layered application
//!   configuration (TOML file + `CHAINWATCH_*` environment).
//!
//! ## Event flow
//!
//! ```text
//! poll ─► fetch next ─► reorg repair ─► log attach ─► backfill
//!                        (Chain)         (Chain)
//!                                                        │
//!              subscriber ◄─ broadcast ◄─ publish queue ◄┘
//!              channels       task          (trail rule)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use chainwatch_core::{HttpProvider, Monitor, MonitorConfig};
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitorConfig::default();
//! let provider = Arc::new(HttpProvider::new(
//!     "https://eth-mainnet.example.com",
//!     config.rpc_timeout(),
//! )?);
//! let monitor = Arc::new(Monitor::new(provider, config)?);
//!
//! let subscription = monitor.subscribe();
//! let runner = Arc::clone(&monitor);
//! tokio::spawn(async move { runner.run().await });
//!
//! while let Some(batch) = subscription.recv().await {
//!     for update in &batch {
//!         println!("{:?} block {}", update.event, update.block.number);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod errors;
pub mod monitor;
pub mod provider;
pub mod types;

pub use config::{AppConfig, ConfigError, MonitorConfig};
pub use errors::MonitorError;
pub use monitor::{Monitor, Subscription};
pub use provider::{HttpProvider, Provider, ProviderError};
pub use types::{
    BlockBatch, BlockEvent, BlockUpdate, LogRecord, SealedBlock, TransactionLocation,
};
