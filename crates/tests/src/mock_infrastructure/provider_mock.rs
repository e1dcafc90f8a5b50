//! Scripted in-process provider for deterministic scenarios.

use async_trait::async_trait;
use chainwatch_core::{LogRecord, Provider, ProviderError, SealedBlock};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// One scripted answer to `logs_by_block_hash`.
#[derive(Clone)]
pub enum LogResponse {
    /// Return this log list.
    Logs(Vec<LogRecord>),
    /// Fail with a timeout.
    Fail,
}

#[derive(Default)]
struct ProviderState {
    /// Canonical chain as the node currently reports it, by number.
    canonical: HashMap<u64, Arc<SealedBlock>>,
    /// Every block ever seen, by hash; reorged-out blocks stay here,
    /// as on a real node.
    by_hash: HashMap<[u8; 32], Arc<SealedBlock>>,
    latest: Option<u64>,
    /// Per-hash scripts; calls consume entries, the last one repeats.
    log_scripts: HashMap<[u8; 32], Vec<LogResponse>>,
}

/// A provider whose chain the test mutates as the scenario unfolds.
#[derive(Default)]
pub struct ScriptedProvider {
    state: Mutex<ProviderState>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block to the node's canonical chain.
    pub fn push_canonical(&self, block: Arc<SealedBlock>) {
        let mut state = self.lock();
        state.by_hash.insert(block.hash, Arc::clone(&block));
        let number = block.number;
        state.canonical.insert(number, block);
        state.latest = Some(state.latest.map_or(number, |l| l.max(number)));
    }

    /// Replaces the canonical block at its height, simulating a reorg.
    /// The displaced block remains resolvable by hash.
    pub fn reorg_to(&self, block: Arc<SealedBlock>) {
        self.push_canonical(block);
    }

    /// Scripts successive `logs_by_block_hash` answers for a hash.
    pub fn script_logs(&self, hash: [u8; 32], responses: Vec<LogResponse>) {
        self.lock().log_scripts.insert(hash, responses);
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn block_by_number(
        &self,
        number: Option<u64>,
    ) -> Result<Arc<SealedBlock>, ProviderError> {
        let state = self.lock();
        let number = match number {
            Some(n) => n,
            None => state.latest.ok_or(ProviderError::NotFound)?,
        };
        state.canonical.get(&number).cloned().ok_or(ProviderError::NotFound)
    }

    async fn block_by_hash(&self, hash: [u8; 32]) -> Result<Arc<SealedBlock>, ProviderError> {
        self.lock().by_hash.get(&hash).cloned().ok_or(ProviderError::NotFound)
    }

    async fn logs_by_block_hash(
        &self,
        block_hash: [u8; 32],
        _topics: &[[u8; 32]],
    ) -> Result<Vec<LogRecord>, ProviderError> {
        let mut state = self.lock();
        let script = state.log_scripts.entry(block_hash).or_default();
        let response = if script.len() > 1 {
            script.remove(0)
        } else {
            script.first().cloned().unwrap_or(LogResponse::Logs(Vec::new()))
        };
        match response {
            LogResponse::Logs(logs) => Ok(logs),
            LogResponse::Fail => Err(ProviderError::Timeout),
        }
    }
}
