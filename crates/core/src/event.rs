//! Security event types emitted by the classifier.
//!
//! Events are transient: created during one detection cycle, serialized as a
//! JSON array, and discarded after submission. The serde layout matches the
//! ingestion endpoint's custom-event schema, keyed by `eventType`.

use serde::{Deserialize, Serialize};

/// A classified security event, tagged on the wire by `eventType`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum SecurityEvent {
    #[serde(rename = "SQLInjection")]
    Injection(InjectionEvent),
    #[serde(rename = "XSSAttack")]
    Xss(XssEvent),
}

impl SecurityEvent {
    /// Name of the rule that produced this event.
    pub fn rule(&self) -> &str {
        match self {
            SecurityEvent::Injection(e) => &e.rule,
            SecurityEvent::Xss(e) => &e.rule,
        }
    }

    /// Event time in whole epoch seconds.
    pub fn timestamp(&self) -> i64 {
        match self {
            SecurityEvent::Injection(e) => e.timestamp,
            SecurityEvent::Xss(e) => e.timestamp,
        }
    }
}

/// A query record matched one of the SQL-injection rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionEvent {
    /// The offending query, verbatim.
    pub query: String,
    /// First whitespace-delimited token of the query text.
    #[serde(rename = "baseQueryType")]
    pub base_query_type: String,
    /// Danger vocabulary words found in the query, comma-joined in
    /// vocabulary order regardless of where they appear in the text.
    #[serde(rename = "dangerWords")]
    pub danger_words: String,
    /// Rule that matched.
    pub rule: String,
    /// Capture time in whole epoch seconds.
    pub timestamp: i64,
}

/// A request parameter value was altered by the sanitizing transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XssEvent {
    /// Original request path, unsanitized.
    pub path: String,
    /// Original request body, unsanitized.
    pub body: String,
    /// Rule that matched (always `"xss"`).
    pub rule: String,
    /// Capture time in whole epoch seconds.
    pub timestamp: i64,
}
