//! Named pattern rules and the ordered rule sets.
//!
//! Rules are a closed set fixed at process start: each is a name plus a
//! matcher variant evaluated in a fixed loop. Order only affects log and
//! event ordering, never whether a rule matches, since every rule is
//! evaluated independently for every record.

use regex::Regex;

/// How a rule decides whether a piece of text matches.
#[derive(Debug)]
enum Matcher {
    /// Plain regex match.
    Pattern(Regex),
    /// Regex with two operand captures that must be equal, e.g. the
    /// `OR x=x` tautology. Stands in for a back-reference, which the
    /// regex engine does not support.
    Tautology(Regex),
}

/// A single named predicate classifying text as a known attack pattern.
///
/// Rules are stateless; one instance is reused across all records in a
/// cycle and across concurrent evaluations.
#[derive(Debug)]
pub struct Rule {
    name: &'static str,
    matcher: Matcher,
}

impl Rule {
    fn pattern(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            matcher: Matcher::Pattern(
                Regex::new(pattern).expect("rule pattern is a valid regex"),
            ),
        }
    }

    fn tautology(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            matcher: Matcher::Tautology(
                Regex::new(pattern).expect("rule pattern is a valid regex"),
            ),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this rule matches the given raw text.
    pub fn matches(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Pattern(regex) => regex.is_match(text),
            Matcher::Tautology(regex) => regex.captures_iter(text).any(|caps| {
                match (caps.get(1), caps.get(2)) {
                    (Some(lhs), Some(rhs)) => lhs.as_str().eq_ignore_ascii_case(rhs.as_str()),
                    _ => false,
                }
            }),
        }
    }
}

/// An ordered, immutable collection of rules for one telemetry kind.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// The SQL-injection rule set, in evaluation order.
    pub fn sql_injection() -> Self {
        Self {
            rules: vec![
                Rule::pattern("script_tag", r"(?i)(<|%3C)\s*script"),
                Rule::pattern("comment_dashes", r"--"),
                Rule::pattern("comment_slash_star", r"/\*"),
                Rule::pattern("semicolon", r";"),
                Rule::pattern("unmatched_quotes", r"^([^']*'([^']*'[^']*')*[^']*')[^']*'[^']*$"),
                Rule::tautology("always_true", r"(?i)OR\s+(['\w]+)=(['\w]+)"),
                Rule::pattern("union", r"UNION"),
                Rule::pattern("char_casting", r"(?i)CHR(\(|%28)"),
                Rule::pattern("system_catalog_access", r"(?i)FROM\s+pg_"),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Names of all rules matching the text, in rule-set order.
    pub fn matching(&self, text: &str) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|r| r.matches(text))
            .map(|r| r.name())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql() -> RuleSet {
        RuleSet::sql_injection()
    }

    #[test]
    fn rule_set_order_is_fixed() {
        let names: Vec<_> = sql().iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec![
                "script_tag",
                "comment_dashes",
                "comment_slash_star",
                "semicolon",
                "unmatched_quotes",
                "always_true",
                "union",
                "char_casting",
                "system_catalog_access",
            ]
        );
    }

    #[test]
    fn script_tag_matches_literal_and_encoded() {
        let names = sql();
        let rule = names.iter().find(|r| r.name() == "script_tag").unwrap();
        assert!(rule.matches("<script>alert(1)</script>"));
        assert!(rule.matches("< SCRIPT src=x>"));
        assert!(rule.matches("%3Cscript%3E"));
        assert!(!rule.matches("describe script"));
    }

    #[test]
    fn comment_and_terminator_rules() {
        assert!(sql().matching("SELECT 1 -- peek").contains(&"comment_dashes"));
        assert!(sql().matching("SELECT /* hidden */ 1").contains(&"comment_slash_star"));
        assert!(sql().matching("SELECT 1;").contains(&"semicolon"));
    }

    #[test]
    fn unmatched_quotes_detects_odd_quote_structure() {
        let rule_set = sql();
        let odd = rule_set.matching("SELECT * FROM t WHERE a='x' OR 'y");
        assert!(odd.contains(&"unmatched_quotes"));
        let balanced = rule_set.matching("SELECT * FROM t WHERE a='x'");
        assert!(!balanced.contains(&"unmatched_quotes"));
    }

    #[test]
    fn always_true_requires_equal_operands() {
        let rule_set = sql();
        assert!(rule_set.matching("SELECT 1 OR 'a'='a'").contains(&"always_true"));
        assert!(rule_set.matching("SELECT 1 or 1=1").contains(&"always_true"));
        assert!(!rule_set.matching("SELECT 1 OR 'a'='b'").contains(&"always_true"));
        assert!(!rule_set.matching("SELECT 1 WHERE a=a").contains(&"always_true"));
        // The token comparison is case-insensitive, like the rest of the rule.
        assert!(rule_set.matching("SELECT 1 OR abc=ABC").contains(&"always_true"));
    }

    #[test]
    fn union_is_case_sensitive() {
        let rule_set = sql();
        assert!(rule_set.matching("1 UNION SELECT password FROM t").contains(&"union"));
        assert!(!rule_set.matching("1 union select 1").contains(&"union"));
    }

    #[test]
    fn char_casting_matches_literal_and_encoded_paren() {
        let rule_set = sql();
        assert!(rule_set.matching("SELECT CHR(65)").contains(&"char_casting"));
        assert!(rule_set.matching("select chr%2865%29").contains(&"char_casting"));
        assert!(!rule_set.matching("SELECT CHROME").contains(&"char_casting"));
    }

    #[test]
    fn system_catalog_access_is_case_insensitive() {
        let rule_set = sql();
        assert!(rule_set.matching("SELECT * FROM pg_shadow").contains(&"system_catalog_access"));
        assert!(rule_set.matching("select * from PG_user").contains(&"system_catalog_access"));
        assert!(!rule_set.matching("SELECT * FROM users").contains(&"system_catalog_access"));
    }

    #[test]
    fn one_text_can_match_many_rules() {
        let names = sql().matching("SELECT * FROM users; DROP TABLE users;--");
        assert!(names.contains(&"semicolon"));
        assert!(names.contains(&"comment_dashes"));
        assert!(names.len() >= 2);
    }
}
