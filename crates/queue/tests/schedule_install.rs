//! Idempotent schedule installation against the in-memory store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use wiretrap_queue::{
    Job, JobStore, MemoryStore, ScheduleEntry, ScheduleInstaller, ScheduleRunner,
};

fn detection_entry() -> ScheduleEntry {
    ScheduleEntry::every_minute("detect")
}

#[tokio::test]
async fn installing_twice_leaves_one_entry() {
    let store = Arc::new(MemoryStore::new());
    let installer = ScheduleInstaller::new(store.clone());

    installer.install(&[detection_entry()]).await.unwrap();
    installer.install(&[detection_entry()]).await.unwrap();

    let entries = store.schedule_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].job_kind, "detect");
    assert_eq!(store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn install_discards_stale_pending_jobs() {
    let store = Arc::new(MemoryStore::new());

    // Jobs left over from a previous process lifetime.
    store.enqueue(&Job::new("detect")).await.unwrap();
    store.enqueue(&Job::new("detect")).await.unwrap();

    let installer = ScheduleInstaller::new(store.clone());
    installer.install(&[detection_entry()]).await.unwrap();

    assert_eq!(store.pending_count().await.unwrap(), 0);
    assert!(store.pop().await.unwrap().is_none());
}

#[tokio::test]
async fn install_replaces_previous_entries() {
    let store = Arc::new(MemoryStore::new());
    let installer = ScheduleInstaller::new(store.clone());

    installer
        .install(&[ScheduleEntry::recurring("old-kind", "*/5 * * * *")])
        .await
        .unwrap();
    installer.install(&[detection_entry()]).await.unwrap();

    let entries = store.schedule_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].job_kind, "detect");
}

#[tokio::test]
async fn install_rejects_invalid_cron() {
    let store = Arc::new(MemoryStore::new());
    let installer = ScheduleInstaller::new(store.clone());

    let mut entry = detection_entry();
    entry.cron_expression = "definitely not cron".to_string();
    assert!(installer.install(&[entry]).await.is_err());
}

#[tokio::test]
async fn runner_enqueues_once_per_due_tick() {
    let store = Arc::new(MemoryStore::new());
    let installer = ScheduleInstaller::new(store.clone());
    installer.install(&[detection_entry()]).await.unwrap();

    let runner = ScheduleRunner::new(store.clone(), Arc::new(Notify::new()));
    let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();

    // First due tick enqueues exactly one job.
    runner.tick(t0).await;
    assert_eq!(store.pending_count().await.unwrap(), 1);

    // Re-ticking within the same minute does not enqueue again.
    runner.tick(t0 + chrono::Duration::seconds(1)).await;
    runner.tick(t0 + chrono::Duration::seconds(59)).await;
    assert_eq!(store.pending_count().await.unwrap(), 1);

    // The next minute boundary does.
    runner.tick(t0 + chrono::Duration::seconds(60)).await;
    assert_eq!(store.pending_count().await.unwrap(), 2);
}

#[tokio::test]
async fn runner_enqueues_the_installed_job_kind() {
    let store = Arc::new(MemoryStore::new());
    let installer = ScheduleInstaller::new(store.clone());
    installer.install(&[detection_entry()]).await.unwrap();

    let runner = ScheduleRunner::new(store.clone(), Arc::new(Notify::new()));
    runner.tick(Utc::now()).await;

    let job = store.pop().await.unwrap().unwrap();
    assert_eq!(job.kind, "detect");
    assert_eq!(job.meta.retry_attempts, 0);
}
