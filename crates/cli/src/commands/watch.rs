//! The `watch` command: run the monitor and stream events to the log.

use anyhow::{Context, Result};
use chainwatch_core::{
    config::{LoggingConfig, MonitorConfig, ProviderSettings},
    AppConfig, BlockEvent, HttpProvider, Monitor,
};
use clap::Args;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Args)]
pub struct WatchArgs {
    /// Path to the TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint URL (overrides the config file)
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Block number to start from; negative starts that many blocks
    /// behind the head
    #[arg(long, allow_hyphen_values = true)]
    pub start_block: Option<i64>,

    /// Attach event logs to published blocks
    #[arg(long)]
    pub with_logs: bool,

    /// Number of blocks to trail behind the head before publishing
    #[arg(long)]
    pub trail: Option<u64>,

    /// Number of blocks kept on the canonical chain cache
    #[arg(long)]
    pub retention: Option<usize>,

    /// Raise logging to debug
    #[arg(long)]
    pub debug: bool,
}

pub async fn run_watch(args: WatchArgs) -> Result<()> {
    let mut app = load_config(args.config.as_deref(), args.rpc_url.as_deref())?;
    apply_overrides(&mut app.monitor, &args);
    init_logging(&app, args.debug);

    let provider = Arc::new(
        HttpProvider::new(app.provider.url.clone(), app.monitor.rpc_timeout())
            .context("failed to build the RPC provider")?,
    );
    let monitor =
        Arc::new(Monitor::new(provider, app.monitor.clone()).context("failed to build monitor")?);

    info!(url = %app.provider.url, "watching chain");

    let subscription = monitor.subscribe();
    let consumer = tokio::spawn(async move {
        while let Some(batch) = subscription.recv().await {
            for update in &batch {
                let event = match update.event {
                    BlockEvent::Added => "added",
                    BlockEvent::Removed => "removed",
                };
                info!(
                    event,
                    number = update.block.number,
                    hash = %hex::encode(update.block.hash),
                    txns = update.block.transactions.len(),
                    logs = update.logs.len(),
                    ok = update.ok,
                    "block"
                );
            }
        }
    });

    let runner = Arc::clone(&monitor);
    let mut run_handle = tokio::spawn(async move { runner.run().await });

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, stopping monitor");
            monitor.stop();
            run_handle.await.context("monitor task panicked")?
        }
        joined = &mut run_handle => joined.context("monitor task panicked")?,
    };

    consumer.abort();

    match result {
        Ok(()) => {
            info!("monitor stopped");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "monitor exited with an error");
            Err(err.into())
        }
    }
}

fn load_config(path: Option<&Path>, rpc_url: Option<&str>) -> Result<AppConfig> {
    match AppConfig::load(path) {
        Ok(mut app) => {
            if let Some(url) = rpc_url {
                app.provider.url = url.to_string();
            }
            Ok(app)
        }
        // No file given: a bare --rpc-url is enough to run with
        // defaults.
        Err(_) if path.is_none() && rpc_url.is_some() => Ok(AppConfig {
            provider: ProviderSettings {
                url: rpc_url.unwrap_or_default().to_string(),
            },
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
        }),
        Err(err) => Err(err).context("failed to load configuration"),
    }
}

fn apply_overrides(monitor: &mut MonitorConfig, args: &WatchArgs) {
    if let Some(start) = args.start_block {
        monitor.start_block_number = Some(start);
    }
    if args.with_logs {
        monitor.with_logs = true;
    }
    if let Some(trail) = args.trail {
        monitor.trail_num_blocks_behind_head = trail;
    }
    if let Some(retention) = args.retention {
        monitor.block_retention_limit = retention;
    }
}

fn init_logging(app: &AppConfig, debug: bool) {
    let level = if debug || app.monitor.debug_logging {
        "debug"
    } else {
        app.logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,chainwatch_core={level},cli={level}"))
    });
    let registry = tracing_subscriber::registry().with(filter);

    if app.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}
