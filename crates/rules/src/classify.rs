//! The classifier: filtered records in, security events out.

use indexmap::IndexMap;
use tracing::info;

use wiretrap_core::{
    timestamp_secs, InjectionEvent, QueryRecord, RequestRecord, SecurityEvent, XssEvent,
};

use crate::ruleset::RuleSet;
use crate::sanitize;

/// Danger vocabulary scanned for in matched queries. Output order is
/// always this order, regardless of where the words appear in the text.
const DANGER_WORDS: [&str; 6] = ["UPDATE", "DELETE", "INSERT", "SCRIPT", "DROP", "TRUNCATE"];

/// Applies the rule sets to filtered record streams.
///
/// A record is evaluated against every rule independently: no
/// deduplication and no short-circuit after the first match, so one
/// record yields exactly one event per matching rule.
#[derive(Debug)]
pub struct Classifier {
    sql_rules: RuleSet,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            sql_rules: RuleSet::sql_injection(),
        }
    }

    /// Classify query records against the SQL-injection rule set.
    pub fn classify_queries(&self, records: &[QueryRecord]) -> Vec<SecurityEvent> {
        let mut events = Vec::new();
        for record in records {
            for rule in self.sql_rules.iter() {
                if rule.matches(&record.query) {
                    info!(query = %record.query, rule = rule.name(), "query matched rule");
                    events.push(SecurityEvent::Injection(InjectionEvent {
                        query: record.query.clone(),
                        base_query_type: base_query_type(&record.query),
                        danger_words: danger_words(&record.query),
                        rule: rule.name().to_string(),
                        timestamp: timestamp_secs(record.timestamp_ns),
                    }));
                }
            }
        }
        events
    }

    /// Classify request records with the differential-sanitizer XSS check.
    ///
    /// Each parameter value whose sanitized form differs from the original
    /// produces one event for the request, so a request with several
    /// tainted values yields several events. The emitted path and body are
    /// always the original, unsanitized field values.
    pub fn classify_requests(&self, records: &[RequestRecord]) -> Vec<SecurityEvent> {
        let mut events = Vec::new();
        for record in records {
            for values in query_params(&record.path).values() {
                for value in values {
                    if sanitize::is_altered(value) {
                        info!(path = %record.path, body = %record.body, "request matched xss rule");
                        events.push(SecurityEvent::Xss(XssEvent {
                            path: record.path.clone(),
                            body: record.body.clone(),
                            rule: "xss".to_string(),
                            timestamp: timestamp_secs(record.timestamp_ns),
                        }));
                    }
                }
            }
        }
        events
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

/// First whitespace-delimited token of the query text; empty for blank text.
fn base_query_type(query: &str) -> String {
    query.split_whitespace().next().unwrap_or_default().to_string()
}

/// Danger vocabulary words present in the query (case-insensitive
/// substring scan), comma-joined in vocabulary order.
fn danger_words(query: &str) -> String {
    let upper = query.to_uppercase();
    DANGER_WORDS
        .iter()
        .filter(|w| upper.contains(**w))
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse the query-string component of a request path into parameter →
/// ordered values, parameters keyed by first appearance.
///
/// Paths with no query string (or nothing parseable after `?`) simply
/// yield no parameters; a malformed record never aborts the batch.
fn query_params(path: &str) -> IndexMap<String, Vec<String>> {
    let mut params: IndexMap<String, Vec<String>> = IndexMap::new();
    let Some((_, query)) = path.split_once('?') else {
        return params;
    };
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(text: &str, timestamp_ns: i64) -> QueryRecord {
        QueryRecord {
            query: text.to_string(),
            timestamp_ns,
        }
    }

    fn request(path: &str, body: &str) -> RequestRecord {
        RequestRecord {
            path: path.to_string(),
            body: body.to_string(),
            timestamp_ns: 1_700_000_000_500_000_000,
        }
    }

    fn injection_events(events: &[SecurityEvent]) -> Vec<&InjectionEvent> {
        events
            .iter()
            .map(|e| match e {
                SecurityEvent::Injection(inner) => inner,
                other => panic!("expected injection event, got: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn stacked_query_matches_multiple_rules() {
        let classifier = Classifier::new();
        let events = classifier.classify_queries(&[query(
            "SELECT * FROM users; DROP TABLE users;--",
            1_700_000_000_000_000_000,
        )]);

        let events = injection_events(&events);
        assert!(events.len() >= 2);
        let rules: Vec<_> = events.iter().map(|e| e.rule.as_str()).collect();
        assert!(rules.contains(&"semicolon"));
        assert!(rules.contains(&"comment_dashes"));
        for event in &events {
            assert_eq!(event.base_query_type, "SELECT");
            assert!(event.danger_words.contains("DROP"));
            assert_eq!(event.timestamp, 1_700_000_000);
        }
    }

    #[test]
    fn tautology_produces_always_true_event() {
        let classifier = Classifier::new();
        let events = classifier.classify_queries(&[query("SELECT 1 OR 'a'='a'", 0)]);
        let rules: Vec<_> = injection_events(&events)
            .iter()
            .map(|e| e.rule.clone())
            .collect();
        assert!(rules.contains(&"always_true".to_string()));
    }

    #[test]
    fn clean_query_produces_no_events() {
        let classifier = Classifier::new();
        assert!(classifier.classify_queries(&[query("SELECT name FROM users", 0)]).is_empty());
    }

    #[test]
    fn event_count_equals_matching_rule_count() {
        // No dedup, no short-circuit: one event per matching rule.
        let classifier = Classifier::new();
        let text = "SELECT * FROM pg_shadow; -- /* x */ UNION";
        let expected = RuleSet::sql_injection().matching(text).len();
        let events = classifier.classify_queries(&[query(text, 0)]);
        assert_eq!(events.len(), expected);
        assert!(expected >= 4);
    }

    #[test]
    fn danger_words_keep_vocabulary_order() {
        let classifier = Classifier::new();
        let events =
            classifier.classify_queries(&[query("TRUNCATE t; delete from t; update t", 0)]);
        let events = injection_events(&events);
        // Appearance order is TRUNCATE, DELETE, UPDATE; output stays in
        // vocabulary order.
        assert_eq!(events[0].danger_words, "UPDATE, DELETE, TRUNCATE");
    }

    #[test]
    fn script_tag_query_yields_single_xss_event() {
        let classifier = Classifier::new();
        let events =
            classifier.classify_requests(&[request("/search?q=<script>alert(1)</script>", "")]);
        assert_eq!(events.len(), 1);
        match &events[0] {
            SecurityEvent::Xss(event) => {
                assert_eq!(event.rule, "xss");
                assert_eq!(event.path, "/search?q=<script>alert(1)</script>");
                assert_eq!(event.timestamp, 1_700_000_000);
            }
            other => panic!("expected xss event, got: {other:?}"),
        }
    }

    #[test]
    fn each_tainted_value_yields_its_own_event() {
        let classifier = Classifier::new();
        let events = classifier.classify_requests(&[request(
            "/form?a=<b>&a=clean&b=x%22y",
            "payload",
        )]);
        assert_eq!(events.len(), 2);
        for event in &events {
            match event {
                SecurityEvent::Xss(e) => assert_eq!(e.body, "payload"),
                other => panic!("expected xss event, got: {other:?}"),
            }
        }
    }

    #[test]
    fn path_without_query_string_is_benign() {
        let classifier = Classifier::new();
        assert!(classifier.classify_requests(&[request("/search", "")]).is_empty());
        assert!(classifier.classify_requests(&[request("/search?", "")]).is_empty());
    }

    #[test]
    fn percent_encoded_payloads_are_decoded_before_the_check() {
        let classifier = Classifier::new();
        let events =
            classifier.classify_requests(&[request("/search?q=%3Cscript%3E", "")]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn base_query_type_takes_first_token() {
        assert_eq!(base_query_type("SELECT * FROM t"), "SELECT");
        assert_eq!(base_query_type("  delete from t"), "delete");
        assert_eq!(base_query_type(""), "");
    }

    #[test]
    fn query_params_group_in_first_appearance_order() {
        let params = query_params("/p?b=1&a=2&b=3");
        let keys: Vec<_> = params.keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(params["b"], vec!["1".to_string(), "3".to_string()]);
    }
}
