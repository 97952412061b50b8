//! Recurring schedule entries, idempotent installation, and the tick loop.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::error::QueueError;
use crate::job::Job;
use crate::store::JobStore;

/// Default poll interval for the schedule runner.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Callers use standard 5-field cron: `min hour day-of-month month day-of-week`.
pub(crate) fn normalize_cron(cron_5field: &str) -> String {
    let trimmed = cron_5field.trim();
    let field_count = trimmed.split_whitespace().count();
    if field_count == 5 {
        format!("0 {}", trimmed)
    } else {
        // Already 6-field or non-standard; pass through as-is.
        trimmed.to_string()
    }
}

/// Check if a cron schedule is due at `now`.
///
/// An entry is due if a scheduled tick falls between `last_enqueued`
/// (exclusive) and `now` (inclusive). If `last_enqueued` is `None`, any
/// tick at or before `now` counts.
pub(crate) fn is_cron_due(
    schedule: &Schedule,
    now: DateTime<Utc>,
    last_enqueued: Option<DateTime<Utc>>,
) -> bool {
    let check_from = last_enqueued.unwrap_or(now - chrono::Duration::days(1));
    if let Some(next) = schedule.after(&check_from).next() {
        next <= now
    } else {
        false
    }
}

/// One recurring schedule entry: on each due tick, one job of `job_kind`
/// is enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Entry identifier (doubles as the store key).
    pub id: String,
    /// Job kind enqueued on each tick.
    pub job_kind: String,
    /// Normalized 6-field cron expression.
    pub cron_expression: String,
    /// When this entry last enqueued a job.
    pub last_enqueued: Option<DateTime<Utc>>,
}

impl ScheduleEntry {
    /// Build an entry from a standard 5-field cron expression.
    pub fn recurring(job_kind: impl Into<String>, cron_5field: &str) -> Self {
        let job_kind = job_kind.into();
        Self {
            id: job_kind.clone(),
            job_kind,
            cron_expression: normalize_cron(cron_5field),
            last_enqueued: None,
        }
    }

    /// Build the standard every-minute entry for a job kind.
    pub fn every_minute(job_kind: impl Into<String>) -> Self {
        Self::recurring(job_kind, "*/1 * * * *")
    }

    fn parsed(&self) -> Result<Schedule, QueueError> {
        Schedule::from_str(&self.cron_expression).map_err(|e| {
            QueueError::Schedule(format!(
                "invalid cron expression '{}' for entry '{}': {e}",
                self.cron_expression, self.id
            ))
        })
    }
}

// ── Installer ───────────────────────────────────────────────────────

/// Installs the recurring schedule at process startup.
///
/// The clear-then-install sequence is mandatory: pending jobs and schedule
/// entries left over from a previous process lifetime are discarded first,
/// so re-running the installer can never accumulate duplicate entries or
/// let stale jobs execute alongside the fresh schedule. Must complete
/// before any worker starts pulling jobs.
pub struct ScheduleInstaller<S: JobStore + ?Sized> {
    store: Arc<S>,
}

impl<S: JobStore + ?Sized> ScheduleInstaller<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Clear all pending jobs and schedule entries, then install `entries`.
    pub async fn install(&self, entries: &[ScheduleEntry]) -> Result<(), QueueError> {
        let dropped_jobs = self.store.clear_pending().await?;
        if dropped_jobs > 0 {
            info!(count = dropped_jobs, "discarded stale pending jobs");
        }
        let dropped_entries = self.store.clear_schedule().await?;
        if dropped_entries > 0 {
            info!(count = dropped_entries, "removed old schedule entries");
        }

        for entry in entries {
            // Reject unparseable expressions here rather than at tick time.
            entry.parsed()?;
            self.store.put_schedule_entry(entry).await?;
            info!(
                entry_id = %entry.id,
                cron = %entry.cron_expression,
                "installed schedule entry"
            );
        }
        Ok(())
    }
}

// ── Runner ──────────────────────────────────────────────────────────

/// Tick loop that enqueues one job per due schedule entry.
///
/// Entries are re-read from the store on every tick so the store stays the
/// single source of truth. At most one job is enqueued per entry per due
/// tick; nothing deduplicates a still-running previous cycle against the
/// next tick's job.
pub struct ScheduleRunner<S: JobStore + ?Sized> {
    store: Arc<S>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
}

impl<S: JobStore + ?Sized> ScheduleRunner<S> {
    pub fn new(store: Arc<S>, shutdown: Arc<Notify>) -> Self {
        Self {
            store,
            tick_interval: DEFAULT_TICK_INTERVAL,
            shutdown,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Run until shutdown is signaled.
    pub async fn run(&self) -> Result<(), QueueError> {
        info!(tick_interval_ms = self.tick_interval.as_millis() as u64, "schedule runner starting");
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("schedule runner stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.tick_interval) => {
                    self.tick(Utc::now()).await;
                }
            }
        }
    }

    /// Enqueue a job for every entry due at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let entries = match self.store.schedule_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to read schedule entries");
                return;
            }
        };

        for mut entry in entries {
            let schedule = match entry.parsed() {
                Ok(schedule) => schedule,
                Err(e) => {
                    warn!(error = %e, "skipping unparseable schedule entry");
                    continue;
                }
            };
            if !is_cron_due(&schedule, now, entry.last_enqueued) {
                continue;
            }

            let job = Job::new(&entry.job_kind);
            if let Err(e) = self.store.enqueue(&job).await {
                warn!(entry_id = %entry.id, error = %e, "failed to enqueue scheduled job");
                continue;
            }
            info!(entry_id = %entry.id, job_id = %job.id, "enqueued scheduled job");

            entry.last_enqueued = Some(now);
            if let Err(e) = self.store.put_schedule_entry(&entry).await {
                warn!(entry_id = %entry.id, error = %e, "failed to persist schedule state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalize_prepends_seconds_to_5field() {
        assert_eq!(normalize_cron("*/1 * * * *"), "0 */1 * * * *");
        assert_eq!(normalize_cron("  30 4 * * 1  "), "0 30 4 * * 1");
    }

    #[test]
    fn normalize_passes_6field_through() {
        assert_eq!(normalize_cron("15 */1 * * * *"), "15 */1 * * * *");
    }

    #[test]
    fn every_minute_entry_is_due_once_per_minute() {
        let entry = ScheduleEntry::every_minute("detect");
        let schedule = entry.parsed().unwrap();
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();

        // Never enqueued: due immediately.
        assert!(is_cron_due(&schedule, t0, None));

        // Just enqueued: not due until the next minute boundary.
        let half_past = t0 + chrono::Duration::seconds(30);
        assert!(!is_cron_due(&schedule, half_past, Some(t0)));

        let next_minute = t0 + chrono::Duration::seconds(60);
        assert!(is_cron_due(&schedule, next_minute, Some(t0)));
    }

    #[test]
    fn missed_ticks_still_count_as_due() {
        let entry = ScheduleEntry::every_minute("detect");
        let schedule = entry.parsed().unwrap();
        let last = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        // Five minutes of missed ticks: still just "due".
        let now = last + chrono::Duration::seconds(300);
        assert!(is_cron_due(&schedule, now, Some(last)));
    }

    #[test]
    fn recurring_entry_normalizes_its_expression() {
        let entry = ScheduleEntry::recurring("detect", "*/5 * * * *");
        assert_eq!(entry.cron_expression, "0 */5 * * * *");
        assert_eq!(entry.id, "detect");
        assert!(entry.last_enqueued.is_none());
    }

    #[test]
    fn invalid_cron_is_rejected_when_parsed() {
        let mut entry = ScheduleEntry::every_minute("detect");
        entry.cron_expression = "not a cron".to_string();
        assert!(entry.parsed().is_err());
    }
}
