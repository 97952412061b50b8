//! Fixed-rule classification engine for query and request telemetry.
//!
//! This crate provides:
//! - Known-benign record filtering (transaction keywords, excluded paths)
//! - The ordered SQL-injection and XSS rule sets
//! - The classifier turning filtered records into security events

pub mod classify;
pub mod filter;
pub mod ruleset;
pub mod sanitize;

pub use classify::Classifier;
pub use filter::RecordFilter;
pub use ruleset::{Rule, RuleSet};
