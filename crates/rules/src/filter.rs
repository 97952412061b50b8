//! Known-benign record filtering, applied before classification.

use regex::Regex;

use wiretrap_core::{QueryRecord, RequestRecord};

/// Transaction-control statements dropped from the query stream.
///
/// The comparison is exact on the raw field: whole text, case-sensitive,
/// no trimming. A lowercase `begin` is NOT filtered and flows on into
/// classification.
const TRANSACTION_KEYWORDS: [&str; 3] = ["BEGIN", "COMMIT", "ROLLBACK"];

/// Paths never worth classifying: readiness and health probes, the
/// platform's own API, the root path, and the cloud instance-metadata
/// endpoint.
const EXCLUDED_PATH_PATTERNS: [&str; 6] = [
    "^/readyz",
    "^/px\\.api.*",
    "^/$",
    "^/health$",
    "^/healthz$",
    "^/latest/meta-data.*",
];

/// Drops known-benign telemetry records before they reach the rule sets.
///
/// Exclusion patterns are compiled once at construction and shared
/// read-only for the process lifetime.
#[derive(Debug)]
pub struct RecordFilter {
    excluded_paths: Vec<Regex>,
}

impl RecordFilter {
    pub fn new() -> Self {
        let excluded_paths = EXCLUDED_PATH_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("excluded-path pattern is a valid regex"))
            .collect();
        Self { excluded_paths }
    }

    /// Drop query records whose full text equals a transaction keyword.
    pub fn filter_queries(&self, records: Vec<QueryRecord>) -> Vec<QueryRecord> {
        records
            .into_iter()
            .filter(|r| !TRANSACTION_KEYWORDS.contains(&r.query.as_str()))
            .collect()
    }

    /// Drop request records whose path matches any exclusion pattern.
    pub fn filter_requests(&self, records: Vec<RequestRecord>) -> Vec<RequestRecord> {
        records
            .into_iter()
            .filter(|r| !self.excluded_paths.iter().any(|p| p.is_match(&r.path)))
            .collect()
    }
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self::new()
    }
}
