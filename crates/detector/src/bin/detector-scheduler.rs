//! detector-scheduler — installs the recurring schedule and enqueues
//! detection jobs on cadence.
//!
//! On startup all previously pending jobs and schedule entries are
//! discarded before the single every-minute entry is installed, so a
//! restart can never leave duplicate schedules or stale jobs behind.
//! Workers must start after this installation has completed.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use wiretrap_core::{config, Config};
use wiretrap_detector::DETECT_JOB_KIND;
use wiretrap_queue::{JobStore, RedisStore, ScheduleEntry, ScheduleInstaller, ScheduleRunner};

// ── CLI ─────────────────────────────────────────────────────────────

/// Detection scheduler: owns the recurring every-minute schedule.
#[derive(Parser, Debug)]
#[command(name = "detector-scheduler", version, about)]
struct Cli {
    /// Tick interval in milliseconds for due-schedule checks.
    #[arg(long, env = "SCHEDULER_TICK_INTERVAL_MS", default_value_t = 1000)]
    tick_interval_ms: u64,
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

    let installer = ScheduleInstaller::new(store.clone());
    installer
        .install(&[ScheduleEntry::every_minute(DETECT_JOB_KIND)])
        .await?;

    let shutdown = Arc::new(Notify::new());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.notify_waiters();
            }
        }
    });

    let runner = ScheduleRunner::new(store, shutdown)
        .with_tick_interval(std::time::Duration::from_millis(cli.tick_interval_ms));

    info!("detector-scheduler starting");
    runner.run().await?;
    info!("detector-scheduler exited cleanly");

    Ok(())
}
