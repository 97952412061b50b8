//! Durable job-queue substrate for the detection cycle.
//!
//! This crate provides:
//! - The [`Job`] / [`JobMeta`] persisted job model
//! - The [`JobStore`] backend trait with Redis and in-memory implementations
//! - Bounded per-job retry via [`RetryPolicy`]
//! - Idempotent recurring-schedule installation and the schedule runner
//! - The worker loop dispatching jobs to registered [`JobHandler`]s

pub mod error;
pub mod job;
pub mod memory;
pub mod redis_store;
pub mod retry;
pub mod schedule;
pub mod store;
pub mod worker;

pub use error::QueueError;
pub use job::{Job, JobMeta};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use retry::{ErrorReporter, NoopReporter, ReportError, RetryDecision, RetryPolicy};
pub use schedule::{ScheduleEntry, ScheduleInstaller, ScheduleRunner};
pub use store::{JobStore, StoreHealth};
pub use worker::{JobError, JobHandler, Worker};
