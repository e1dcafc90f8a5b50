//! End-to-end monitor scenarios against the scripted provider.
//!
//! All tests run on tokio's paused clock: the monitor's poll sleeps
//! auto-advance whenever the test is otherwise idle, so scenarios are
//! deterministic and effectively instant.

use crate::mock_infrastructure::{
    block, block_with_bloom, fast_config, log_for_block, LogResponse, ScriptedProvider,
};
use chainwatch_core::{
    monitor::Subscription, BlockBatch, BlockEvent, Monitor, MonitorConfig, MonitorError,
};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

type RunHandle = JoinHandle<Result<(), MonitorError>>;

fn start_monitor(
    provider: Arc<ScriptedProvider>,
    config: MonitorConfig,
) -> (Arc<Monitor>, Subscription, RunHandle) {
    let monitor = Arc::new(Monitor::new(provider, config).expect("valid config"));
    let subscription = monitor.subscribe();
    let runner = Arc::clone(&monitor);
    let handle = tokio::spawn(async move { runner.run().await });
    (monitor, subscription, handle)
}

async fn stop_monitor(monitor: &Monitor, handle: RunHandle) {
    monitor.stop();
    handle.await.expect("run task").expect("graceful shutdown");
    assert!(!monitor.is_running());
}

async fn recv_batch(subscription: &Subscription) -> BlockBatch {
    tokio::time::timeout(Duration::from_secs(60), subscription.recv())
        .await
        .expect("timed out waiting for a batch")
        .expect("subscription closed")
}

async fn expect_no_batch(subscription: &Subscription) {
    let result = tokio::time::timeout(Duration::from_millis(500), subscription.recv()).await;
    assert!(result.is_err(), "expected no batch to be delivered");
}

#[tokio::test(start_paused = true)]
async fn linear_growth_delivers_ordered_added_batches() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_canonical(block(100, 100, 99));
    provider.push_canonical(block(101, 101, 100));
    provider.push_canonical(block(102, 102, 101));

    let config = MonitorConfig { start_block_number: Some(100), ..fast_config() };
    let (monitor, subscription, handle) = start_monitor(Arc::clone(&provider), config);
    let second = monitor.subscribe();

    for expected in [100u64, 101, 102] {
        let batch = recv_batch(&subscription).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].event, BlockEvent::Added);
        assert_eq!(batch[0].block.number, expected);
        // Logs are disabled: cleared and complete.
        assert!(batch[0].logs.is_empty());
        assert!(batch[0].ok);
    }

    // Any one subscriber observes a prefix of the global publish
    // order, in the same order.
    for expected in [100u64, 101, 102] {
        assert_eq!(recv_batch(&second).await[0].block.number, expected);
    }

    assert_eq!(monitor.latest_block_num(), 102);
    assert_eq!(monitor.oldest_block_num(), 100);
    assert!(monitor.is_running());
    stop_monitor(&monitor, handle).await;
}

#[tokio::test(start_paused = true)]
async fn depth_one_reorg_publishes_removal_then_replacements() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_canonical(block(100, 100, 99));
    provider.push_canonical(block(101, 101, 100));

    let config = MonitorConfig { start_block_number: Some(100), ..fast_config() };
    let (monitor, subscription, handle) = start_monitor(Arc::clone(&provider), config);

    assert_eq!(recv_batch(&subscription).await[0].block.number, 100);
    assert_eq!(recv_batch(&subscription).await[0].block.number, 101);

    // Replica of the pre-reorg cache for the replay-law check below.
    let mut replica: Vec<[u8; 32]> = vec![[100; 32], [101; 32]];

    // The node switches forks: 101' links to 100, 102' links to 101'.
    provider.reorg_to(block(101, 201, 100));
    provider.push_canonical(block(102, 202, 201));

    let batch = recv_batch(&subscription).await;
    let script: Vec<(BlockEvent, u64, [u8; 32])> = batch
        .iter()
        .map(|u| (u.event, u.block.number, u.block.hash))
        .collect();
    assert_eq!(
        script,
        vec![
            (BlockEvent::Removed, 101, [101; 32]),
            (BlockEvent::Added, 101, [201; 32]),
            (BlockEvent::Added, 102, [202; 32]),
        ]
    );

    // Removed entries are complete and carry no logs.
    assert!(batch[0].ok);
    assert!(batch[0].logs.is_empty());

    // Replaying the edit script against the replica reproduces the
    // monitor's post-reorg cache.
    for update in &batch {
        match update.event {
            BlockEvent::Removed => {
                assert_eq!(replica.pop(), Some(update.block.hash));
            }
            BlockEvent::Added => replica.push(update.block.hash),
        }
    }
    let cache: Vec<[u8; 32]> =
        monitor.chain().blocks().iter().map(|b| b.hash()).collect();
    assert_eq!(replica, cache);
    assert_eq!(monitor.latest_block_num(), 102);

    stop_monitor(&monitor, handle).await;
}

#[tokio::test(start_paused = true)]
async fn trail_behind_defers_publication_until_confirmations() {
    let provider = Arc::new(ScriptedProvider::new());
    for n in 1..=5u64 {
        provider.push_canonical(block(n, n as u8, n as u8 - 1));
    }

    let config = MonitorConfig {
        start_block_number: Some(1),
        trail_num_blocks_behind_head: 2,
        ..fast_config()
    };
    let (monitor, subscription, handle) = start_monitor(Arc::clone(&provider), config);

    // Batches for 1, 2, 3 are released as the head reaches 3, 4, 5.
    for expected in [1u64, 2, 3] {
        let batch = recv_batch(&subscription).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].block.number, expected);
        // Never published above head − trail.
        assert!(batch[0].block.number + 2 <= monitor.latest_block_num());
    }

    // Blocks 4 and 5 stay queued behind the trail.
    expect_no_batch(&subscription).await;
    assert_eq!(monitor.latest_block_num(), 5);

    stop_monitor(&monitor, handle).await;
}

#[tokio::test(start_paused = true)]
async fn log_backfill_publishes_once_with_logs_attached() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_canonical(block_with_bloom(50, 50, 49, 0x40));
    // The node first reports no logs despite the non-zero bloom, then
    // catches up.
    provider.script_logs(
        [50; 32],
        vec![
            LogResponse::Logs(vec![]),
            LogResponse::Logs(vec![log_for_block(50)]),
        ],
    );

    let config = MonitorConfig {
        start_block_number: Some(50),
        with_logs: true,
        ..fast_config()
    };
    let (monitor, subscription, handle) = start_monitor(Arc::clone(&provider), config);

    let batch = recv_batch(&subscription).await;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].block.number, 50);
    assert!(batch[0].ok, "backfilled before release");
    assert_eq!(batch[0].logs.len(), 1);
    assert_eq!(batch[0].logs[0].block_hash, [50; 32]);

    // No duplicate publication for the backfilled block.
    expect_no_batch(&subscription).await;

    stop_monitor(&monitor, handle).await;
}

#[tokio::test(start_paused = true)]
async fn empty_logs_with_zero_bloom_are_trusted() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_canonical(block(60, 60, 59));

    let config = MonitorConfig {
        start_block_number: Some(60),
        with_logs: true,
        ..fast_config()
    };
    let (monitor, subscription, handle) = start_monitor(Arc::clone(&provider), config);

    let batch = recv_batch(&subscription).await;
    assert_eq!(batch[0].block.number, 60);
    assert!(batch[0].ok);
    assert!(batch[0].logs.is_empty());

    stop_monitor(&monitor, handle).await;
}

#[tokio::test(start_paused = true)]
async fn not_found_head_pauses_without_publishing() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_canonical(block(100, 100, 99));

    let config = MonitorConfig { start_block_number: Some(100), ..fast_config() };
    let (monitor, subscription, handle) = start_monitor(Arc::clone(&provider), config);

    assert_eq!(recv_batch(&subscription).await[0].block.number, 100);

    // The probed number does not exist yet: no advance, no batch.
    expect_no_batch(&subscription).await;
    assert_eq!(monitor.latest_block_num(), 100);

    // When the block appears it is published normally.
    provider.push_canonical(block(101, 101, 100));
    assert_eq!(recv_batch(&subscription).await[0].block.number, 101);

    stop_monitor(&monitor, handle).await;
}

#[tokio::test(start_paused = true)]
async fn bootstrap_resumes_from_seeded_head() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_canonical(block(102, 102, 101));

    let config = MonitorConfig {
        bootstrap: true,
        ..fast_config()
    };
    let monitor = Arc::new(
        Monitor::new(Arc::clone(&provider) as Arc<dyn chainwatch_core::Provider>, config)
            .expect("valid config"),
    );
    monitor
        .bootstrap(vec![block(100, 100, 99), block(101, 101, 100)])
        .expect("contiguous seed");

    let subscription = monitor.subscribe();
    let runner = Arc::clone(&monitor);
    let handle = tokio::spawn(async move { runner.run().await });

    // The first published block continues from the seeded head.
    let batch = recv_batch(&subscription).await;
    assert_eq!(batch[0].block.number, 102);
    assert_eq!(monitor.oldest_block_num(), 100);

    stop_monitor(&monitor, handle).await;
}

#[tokio::test(start_paused = true)]
async fn retention_evicts_oldest_blocks() {
    let provider = Arc::new(ScriptedProvider::new());
    for n in 1..=6u64 {
        provider.push_canonical(block(n, n as u8, n as u8 - 1));
    }

    let config = MonitorConfig {
        start_block_number: Some(1),
        block_retention_limit: 3,
        ..fast_config()
    };
    let (monitor, subscription, handle) = start_monitor(Arc::clone(&provider), config);

    for expected in 1..=6u64 {
        assert_eq!(recv_batch(&subscription).await[0].block.number, expected);
    }

    // Only the newest three blocks remain cached.
    assert_eq!(monitor.oldest_block_num(), 4);
    assert_eq!(monitor.latest_block_num(), 6);
    assert!(monitor.get_block([2; 32]).is_none());
    assert!(monitor.get_block([5; 32]).is_some());

    // Finality accessor over the retained window.
    assert_eq!(monitor.latest_final_block(2).map(|b| b.block.number), Some(4));
    assert!(monitor.latest_final_block(3).is_none());

    stop_monitor(&monitor, handle).await;
}

#[tokio::test(start_paused = true)]
async fn second_run_is_rejected_while_running() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_canonical(block(1, 1, 0));

    let config = MonitorConfig { start_block_number: Some(1), ..fast_config() };
    let (monitor, subscription, handle) = start_monitor(Arc::clone(&provider), config);

    // Make sure the run loop is actually up before poking it.
    assert_eq!(recv_batch(&subscription).await[0].block.number, 1);

    let err = monitor.run().await.unwrap_err();
    assert!(matches!(err, MonitorError::AlreadyRunning));

    stop_monitor(&monitor, handle).await;
}

#[tokio::test(start_paused = true)]
async fn transaction_lookup_over_retention() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_canonical(block(10, 10, 9));
    provider.push_canonical(block(11, 11, 10));

    let config = MonitorConfig { start_block_number: Some(10), ..fast_config() };
    let (monitor, subscription, handle) = start_monitor(Arc::clone(&provider), config);

    assert_eq!(recv_batch(&subscription).await[0].block.number, 10);
    assert_eq!(recv_batch(&subscription).await[0].block.number, 11);

    // Fixture blocks carry their tag hash as their only transaction.
    let location = monitor.get_transaction([11; 32]).expect("txn found");
    assert_eq!(location.block_number, 11);
    assert_eq!(location.index, 0);
    assert!(monitor.get_transaction([0xEE; 32]).is_none());

    assert!(monitor.average_block_time() > 0.0);

    stop_monitor(&monitor, handle).await;
}
