//! detector-worker — executes detection-cycle jobs from the durable queue.
//!
//! Pulls ready jobs, runs fetch → filter → classify → submit for each,
//! and retries failures through the persisted attempt counters.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use wiretrap_core::{config, Config};
use wiretrap_detector::DetectionCycle;
use wiretrap_queue::{JobStore, RedisStore, RetryPolicy, Worker};
use wiretrap_sink::{EventSink, SinkReporter};
use wiretrap_telemetry::ClusterClient;

// ── CLI ─────────────────────────────────────────────────────────────

/// Detection worker: executes scheduled detection cycles.
#[derive(Parser, Debug)]
#[command(name = "detector-worker", version, about)]
struct Cli {
    /// Poll interval in milliseconds when the queue is empty.
    #[arg(long, env = "WORKER_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config::load_dotenv();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.log_summary();

    let store = Arc::new(RedisStore::connect(&config.queue).await?);
    let health = store.health_check().await?;
    info!(%health, "job store ready");

    let source = Arc::new(ClusterClient::new(&config.telemetry));
    let sink = EventSink::new(&config.sink);
    let reporter = Arc::new(SinkReporter::new(EventSink::new(&config.sink)));

    let shutdown = Arc::new(Notify::new());
    let mut worker = Worker::new(store, RetryPolicy::new(reporter), shutdown.clone())
        .with_poll_interval(Duration::from_millis(cli.poll_interval_ms));
    worker.register_handler(Arc::new(DetectionCycle::new(source, sink)));

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.notify_waiters();
            }
        }
    });

    info!("detector-worker starting");
    worker.run().await?;
    info!("detector-worker exited cleanly");

    Ok(())
}
