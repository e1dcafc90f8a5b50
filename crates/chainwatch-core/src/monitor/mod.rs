//! Chain monitor: polling loop, reorg repair, log attachment, and
//! ordered publication to subscribers.
//!
//! The monitor polls the provider for the next head block, aligns the
//! local [`Chain`] with the provider's canonical chain (popping and
//! re-adding blocks across reorgs), optionally attaches logs, and
//! publishes the resulting edit script as a batch. Batches wait in a
//! bounded queue until the trail-behind-head rule releases them; a
//! dedicated broadcast task then snapshots and fans them out, so a
//! slow subscriber can never stall the polling loop.

mod channel;
mod fetch;
mod logs;
mod queue;
mod subscription;

pub use subscription::Subscription;

use crate::{
    chain::Chain,
    config::MonitorConfig,
    errors::MonitorError,
    provider::Provider,
    types::{
        BlockBatch, BlockEvent, BlockHash, BlockUpdate, SealedBlock, TrackedBlock,
        TransactionLocation, TxHash,
    },
};
use fetch::BlockFetcher;
use logs::LogAttacher;
use queue::PublishQueue;
use std::{
    cmp,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use subscription::SubscriberSet;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Floor for the adaptive poll interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One edit to the canonical chain, pre-snapshot. Added entries share
/// their [`TrackedBlock`] with the chain so later backfill is visible
/// at broadcast time; Removed entries are final at pop time.
pub(crate) struct ChainEvent {
    pub(crate) event: BlockEvent,
    pub(crate) block: Arc<TrackedBlock>,
}

impl ChainEvent {
    fn snapshot(&self) -> BlockUpdate {
        self.block.snapshot(self.event)
    }
}

/// Batch of chain edits awaiting publication.
pub(crate) type EventBatch = Vec<ChainEvent>;

enum RoundOutcome {
    Published,
    NotFound,
    FetchFailed,
    ResolveFailed,
}

/// Chain-following monitor over a single RPC provider.
///
/// Construct with [`new`](Self::new), start with [`run`](Self::run)
/// (usually on its own task), and consume events through
/// [`subscribe`](Self::subscribe). All accessors are safe to call
/// concurrently with the run loop.
pub struct Monitor {
    config: MonitorConfig,
    provider: Arc<dyn Provider>,
    chain: Arc<Chain>,
    fetcher: BlockFetcher,
    attacher: LogAttacher,
    publish_queue: Mutex<PublishQueue>,
    subscribers: Arc<SubscriberSet>,
    shutdown_tx: broadcast::Sender<()>,
    running: AtomicBool,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

/// Clears the running flag however the loop exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Monitor {
    /// Creates a monitor over `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`] when the options fail
    /// validation.
    pub fn new(provider: Arc<dyn Provider>, config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate().map_err(|e| MonitorError::Config(e.to_string()))?;
        let topics = config
            .log_topic_hashes()
            .map_err(|e| MonitorError::Config(e.to_string()))?;

        let retention = config.effective_retention();
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            chain: Arc::new(Chain::new(retention, config.bootstrap)),
            fetcher: BlockFetcher::new(Arc::clone(&provider), config.polling_interval()),
            attacher: LogAttacher::new(Arc::clone(&provider), topics),
            publish_queue: Mutex::new(PublishQueue::new(retention * 2)),
            subscribers: Arc::new(SubscriberSet::new()),
            shutdown_tx,
            running: AtomicBool::new(false),
            provider,
            config,
        })
    }

    /// Runs the monitor until [`stop`](Self::stop) or a fatal error.
    ///
    /// # Errors
    ///
    /// [`MonitorError::AlreadyRunning`] for a concurrent second call,
    /// [`MonitorError::NotBootstrapped`] in bootstrap mode with an
    /// unseeded chain, and [`MonitorError::Fatal`] when the publish
    /// queue overflows. Graceful shutdown returns `Ok(())`.
    pub async fn run(&self) -> Result<(), MonitorError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MonitorError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        if self.config.bootstrap && !self.chain.is_seeded() {
            return Err(MonitorError::NotBootstrapped);
        }

        let mut next_block = self.resolve_start_position().await;
        match next_block {
            Some(number) => info!(start = number, "monitor starting"),
            None => info!(start = "latest", "monitor starting"),
        }

        let (publish_tx, publish_rx) = mpsc::unbounded_channel::<EventBatch>();
        let broadcaster = self.spawn_broadcaster(publish_rx);

        let result = self.poll_loop(&mut next_block, &publish_tx).await;

        // Closing the channel ends the broadcaster once it has drained
        // everything already released.
        drop(publish_tx);
        let _ = broadcaster.await;
        result
    }

    /// Requests a graceful shutdown of the run loop.
    pub fn stop(&self) {
        info!("monitor stop");
        let _ = self.shutdown_tx.send(());
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The options the monitor was built with.
    #[must_use]
    pub fn options(&self) -> &MonitorConfig {
        &self.config
    }

    /// The underlying provider handle.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// The canonical chain cache.
    #[must_use]
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Registers a subscriber for published batches.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.subscribers.subscribe()
    }

    /// Seeds the chain for bootstrap mode. Blocks must be contiguous;
    /// they are treated as log-complete.
    ///
    /// # Errors
    ///
    /// Chain invariant errors when the seed blocks do not link up.
    pub fn bootstrap(&self, blocks: Vec<Arc<SealedBlock>>) -> Result<(), MonitorError> {
        self.chain.seed(blocks)
    }

    /// Head block of the canonical chain.
    #[must_use]
    pub fn latest_block(&self) -> Option<BlockUpdate> {
        self.chain.head().map(|b| b.snapshot(BlockEvent::Added))
    }

    /// Head block number; zero when the chain is empty.
    #[must_use]
    pub fn latest_block_num(&self) -> u64 {
        self.chain.head().map_or(0, |b| b.number())
    }

    /// The newest block that has reached the given finality depth, or
    /// `None` while retention is shorter than `num_blocks_to_finality
    /// + 1`. Chains differ in the depth they need; pick the constant
    /// for the target chain and re-read on every received batch.
    #[must_use]
    pub fn latest_final_block(&self, num_blocks_to_finality: usize) -> Option<BlockUpdate> {
        self.chain
            .block_at_depth(num_blocks_to_finality)
            .map(|b| b.snapshot(BlockEvent::Added))
    }

    /// Oldest retained block number; zero when the chain is empty.
    #[must_use]
    pub fn oldest_block_num(&self) -> u64 {
        self.chain.tail().map_or(0, |b| b.number())
    }

    /// Searches retention for a block hash.
    #[must_use]
    pub fn get_block(&self, hash: BlockHash) -> Option<BlockUpdate> {
        self.chain.get_block(hash).map(|b| b.snapshot(BlockEvent::Added))
    }

    /// Searches retained canonical blocks for a transaction hash.
    /// Transactions removed from the chain by a reorg are not
    /// reported.
    #[must_use]
    pub fn get_transaction(&self, hash: TxHash) -> Option<TransactionLocation> {
        self.chain.find_transaction(hash)
    }

    /// Average block time in seconds across retention.
    #[must_use]
    pub fn average_block_time(&self) -> f64 {
        self.chain.average_block_time()
    }

    /// Truncates retention to the head block. Useful for tests,
    /// almost never for applications.
    pub fn purge_history(&self) {
        self.chain.purge_history();
    }

    async fn resolve_start_position(&self) -> Option<u64> {
        // A seeded or previously populated chain resumes from its head.
        if let Some(head) = self.chain.head() {
            return Some(head.number() + 1);
        }
        let start = self.config.start_block_number?;
        if start >= 0 {
            return Some(start as u64);
        }
        // Negative start: that many blocks behind the provider's head,
        // best effort; fall back to latest when unresolvable.
        match self.provider.block_by_number(None).await {
            Ok(latest) => latest.number.checked_sub(start.unsigned_abs()),
            Err(err) => {
                warn!(error = %err, "failed to resolve provider head for relative start");
                None
            }
        }
    }

    fn spawn_broadcaster(
        &self,
        mut publish_rx: mpsc::UnboundedReceiver<EventBatch>,
    ) -> tokio::task::JoinHandle<()> {
        let subscribers = Arc::clone(&self.subscribers);
        let mut shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    received = publish_rx.recv() => match received {
                        Some(events) => {
                            let batch: BlockBatch =
                                events.iter().map(ChainEvent::snapshot).collect();
                            if let Some(last) = batch.last() {
                                debug!(
                                    number = last.block.number,
                                    entries = batch.len(),
                                    subscribers = subscribers.len(),
                                    "publishing batch"
                                );
                            }
                            subscribers.broadcast(&batch);
                        }
                        None => break,
                    },
                }
            }
        })
    }

    async fn poll_loop(
        &self,
        next_block: &mut Option<u64>,
        publish_tx: &mpsc::UnboundedSender<EventBatch>,
    ) -> Result<(), MonitorError> {
        let base_interval = self.config.polling_interval();
        let mut poll_interval = base_interval;
        let mut shutdown = self.shutdown_tx.subscribe();

        // Events accumulate across failed rounds so a partially
        // resolved reorg is published once repair completes.
        let mut events: EventBatch = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("monitor stopped");
                    return Ok(());
                }
                () = tokio::time::sleep(poll_interval) => {}
            }

            let outcome = tokio::select! {
                _ = shutdown.recv() => {
                    info!("monitor stopped");
                    return Ok(());
                }
                outcome = self.poll_round(next_block, &mut events, publish_tx) => outcome?,
            };

            match outcome {
                // The fetch succeeded: keep halving while blocks keep
                // arriving; the next NotFound resets to the base.
                RoundOutcome::Published => {
                    poll_interval = cmp::max(poll_interval / 2, MIN_POLL_INTERVAL);
                }
                RoundOutcome::NotFound | RoundOutcome::FetchFailed => {
                    poll_interval = base_interval;
                }
                // The fetch succeeded too, so the cadence still
                // speeds up, but chain repair needs another pass;
                // pause one base interval first.
                RoundOutcome::ResolveFailed => {
                    poll_interval = cmp::max(poll_interval / 2, MIN_POLL_INTERVAL);
                    tokio::select! {
                        _ = shutdown.recv() => {
                            info!("monitor stopped");
                            return Ok(());
                        }
                        () = tokio::time::sleep(base_interval) => {}
                    }
                }
            }
        }
    }

    async fn poll_round(
        &self,
        next_block: &mut Option<u64>,
        events: &mut EventBatch,
        publish_tx: &mpsc::UnboundedSender<EventBatch>,
    ) -> Result<RoundOutcome, MonitorError> {
        if let Some(head) = self.chain.head() {
            *next_block = Some(head.number() + 1);
        }

        let next = match self.fetcher.by_number(*next_block).await {
            Ok(block) => block,
            Err(err) if err.is_not_found() => return Ok(RoundOutcome::NotFound),
            Err(err) => {
                warn!(block = ?next_block, error = %err, "failed to fetch next block, retrying");
                return Ok(RoundOutcome::FetchFailed);
            }
        };

        if let Err(err) = self.build_canonical_chain(next, events).await {
            if matches!(err, MonitorError::ReorgDepthExceeded) {
                warn!("reorg exceeded retention, re-seeding from the provider head");
                *next_block = None;
            } else {
                warn!(error = %err, "failed to extend canonical chain, retrying");
            }
            return Ok(RoundOutcome::ResolveFailed);
        }

        if self.config.with_logs {
            self.attacher.attach(events).await;
            self.attacher.backfill(&self.chain).await;
        } else {
            // Clear logs so the published shape is unambiguous.
            for entry in events.iter() {
                if entry.event == BlockEvent::Added {
                    entry.block.mark_complete_without_logs();
                }
            }
        }

        self.publish(std::mem::take(events), publish_tx)?;
        Ok(RoundOutcome::Published)
    }

    /// Aligns the chain with the provider's canonical chain, emitting
    /// Removed entries (newest-first) for popped blocks and Added
    /// entries (ancestor-first) for the reconnected suffix.
    ///
    /// On error the already-emitted events stay in the batch and
    /// popped blocks are not restored; the next round resumes from the
    /// rewound head.
    async fn build_canonical_chain(
        &self,
        next: Arc<SealedBlock>,
        events: &mut EventBatch,
    ) -> Result<(), MonitorError> {
        debug!(
            number = next.number,
            hash = %hex::encode(next.hash),
            parent = %hex::encode(next.parent_hash),
            txns = next.transactions.len(),
            "next block"
        );

        // New-chain blocks found while walking back, newest first.
        let mut pending: Vec<Arc<SealedBlock>> = vec![next];
        let mut popped_in_walk = 0usize;

        loop {
            let Some(candidate_parent) = pending.last().map(|b| b.parent_hash) else {
                break;
            };
            let connects = match self.chain.head() {
                None => true,
                Some(head) => head.hash() == candidate_parent,
            };
            if connects {
                break;
            }

            let Some(popped) = self.chain.pop() else { break };
            warn!(
                number = popped.number(),
                hash = %hex::encode(popped.hash()),
                "block reorg, reverting block"
            );
            events.push(ChainEvent { event: BlockEvent::Removed, block: popped });

            popped_in_walk += 1;
            if popped_in_walk >= self.chain.retention() {
                return Err(MonitorError::ReorgDepthExceeded);
            }

            // Pause between pops so the node can settle on one fork.
            let pause = self.config.polling_interval() * events.len() as u32;
            tokio::time::sleep(pause).await;

            let parent = self.fetcher.by_hash(candidate_parent).await?;
            pending.push(parent);
        }

        // Reconnect ancestor-first; pushes only happen on success, so
        // a failed walk leaves the chain rewound but consistent.
        for sealed in pending.drain(..).rev() {
            let tracked = Arc::new(TrackedBlock::new(sealed));
            self.chain.push(Arc::clone(&tracked))?;
            events.push(ChainEvent { event: BlockEvent::Added, block: tracked });
        }
        Ok(())
    }

    fn publish(
        &self,
        events: EventBatch,
        publish_tx: &mpsc::UnboundedSender<EventBatch>,
    ) -> Result<(), MonitorError> {
        let trail = self.config.trail_num_blocks_behind_head;
        let mut queue = self.publish_queue.lock().unwrap_or_else(PoisonError::into_inner);

        // Failing to enqueue is rare but fatal: the monitor task is
        // the only producer, so a full queue cannot drain itself.
        queue.enqueue(events).map_err(MonitorError::fatal)?;

        let release = if trail == 0 {
            Some(None)
        } else {
            // Nothing is releasable until the head clears the trail.
            self.latest_block_num().checked_sub(trail).map(Some)
        };

        if let Some(max_block) = release {
            if let Some(batch) = queue.dequeue(max_block) {
                debug!(entries = batch.len(), queued = queue.len(), "batch released");
                // A closed channel only means shutdown already began.
                let _ = publish_tx.send(batch);
            }
        }
        Ok(())
    }
}
