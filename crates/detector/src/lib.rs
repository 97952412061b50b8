//! The detection cycle: fetch, filter, classify, submit.

pub mod cycle;

pub use cycle::{DetectionCycle, DETECT_JOB_KIND};
