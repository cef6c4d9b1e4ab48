//! Interception rule model.
//!
//! An explicit per-page table mapping URL patterns to mock responses, instead
//! of an implicit routing table hidden inside the browser driver. The CDP
//! Fetch pattern list is always derived from this registry, so driver state
//! cannot drift from ours.

use pagemock_core::{Error, Result};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// The fixed HTTP verb set accepted by the mock schema.
pub const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// Compiled URL matcher.
///
/// Patterns starting with `^` are raw regular expressions. Everything else is
/// a glob (`*` = any run of characters, `?` = one character). A glob starting
/// with `/` additionally matches against the URL path alone, so `/api/users`
/// matches `https://host/api/users` without needing a host wildcard.
#[derive(Debug, Clone)]
struct UrlMatcher {
    re: Regex,
    match_path: bool,
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c if "\\.+()[]{}|^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

impl UrlMatcher {
    fn compile(pattern: &str) -> Result<Self> {
        let (source, match_path) = if let Some(raw) = pattern.strip_prefix('^') {
            (format!("^{}", raw), false)
        } else {
            (glob_to_regex(pattern), pattern.starts_with('/'))
        };
        let re = Regex::new(&source)
            .map_err(|e| Error::Validation(format!("url pattern is not valid: {}", e)))?;
        Ok(Self { re, match_path })
    }

    fn matches(&self, url: &str) -> bool {
        if self.re.is_match(url) {
            return true;
        }
        if self.match_path {
            if let Ok(parsed) = url::Url::parse(url) {
                return self.re.is_match(parsed.path());
            }
        }
        false
    }
}

/// A single registered response override. Never mutated after creation;
/// clearing removes it, it is not edited in place.
#[derive(Debug, Clone)]
pub struct InterceptionRule {
    pub url_pattern: String,
    /// Absent = match any request method.
    pub method: Option<HttpMethod>,
    /// HTTP status of the synthetic response, 100-599.
    pub status: u16,
    pub content_type: String,
    pub body: String,
    pub extra_headers: BTreeMap<String, String>,
    matcher: UrlMatcher,
}

impl InterceptionRule {
    pub fn new(
        url_pattern: String,
        method: Option<HttpMethod>,
        status: u16,
        content_type: String,
        body: String,
        extra_headers: BTreeMap<String, String>,
    ) -> Result<Self> {
        if url_pattern.trim().is_empty() {
            return Err(Error::Validation(
                "url must be a non-empty string".to_string(),
            ));
        }
        if !(100..=599).contains(&status) {
            return Err(Error::Validation(format!(
                "status must be within 100-599, got {}",
                status
            )));
        }
        let matcher = UrlMatcher::compile(&url_pattern)?;
        Ok(Self {
            url_pattern,
            method,
            status,
            content_type,
            body,
            extra_headers,
            matcher,
        })
    }

    /// Whether this rule applies to a live request.
    /// A rule without a method matches any request method.
    pub fn matches(&self, url: &str, method: &str) -> bool {
        if let Some(m) = self.method {
            if !method.eq_ignore_ascii_case(m.as_str()) {
                return false;
            }
        }
        self.matcher.matches(url)
    }

    pub fn method_label(&self) -> &'static str {
        self.method.map(|m| m.as_str()).unwrap_or("ANY")
    }

    /// Response headers as CDP HeaderEntry objects, Content-Type first.
    pub fn response_headers(&self) -> Vec<Value> {
        let mut headers = vec![json!({"name": "Content-Type", "value": self.content_type})];
        for (name, value) in &self.extra_headers {
            headers.push(json!({"name": name, "value": value}));
        }
        headers
    }

    /// Transcript of the imperative CDP steps this rule stands for.
    /// Built from the same fields the interceptor executes with, so the
    /// recorded behavior cannot drift from the real one.
    pub fn transcript(&self) -> Vec<String> {
        let header_names: Vec<String> = self
            .response_headers()
            .iter()
            .filter_map(|h| h.get("name").and_then(|n| n.as_str()).map(String::from))
            .collect();
        vec![
            "Fetch.enable patterns=[{urlPattern: \"*\", requestStage: Request}]".to_string(),
            format!(
                "on Fetch.requestPaused [url ~ {} method = {}] -> Fetch.fulfillRequest status={} headers=[{}] bodyBytes={}",
                self.url_pattern,
                self.method_label(),
                self.status,
                header_names.join(", "),
                self.body.len(),
            ),
            "on Fetch.requestPaused [no rule matches] -> Fetch.continueRequest".to_string(),
        ]
    }
}

/// Per-page table of interception rules.
///
/// Insertion-ordered: at most one rule per pattern (re-registering replaces,
/// never stacks), and when several distinct patterns match one request the
/// most recently registered rule wins.
#[derive(Debug, Default)]
pub struct MockRegistry {
    rules: Vec<InterceptionRule>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, replacing any existing rule for the same pattern.
    /// Returns true when a rule was replaced.
    pub fn insert(&mut self, rule: InterceptionRule) -> bool {
        let replaced = self.remove(&rule.url_pattern);
        self.rules.push(rule);
        replaced
    }

    /// Remove the rule for an exact pattern. Idempotent: removing a pattern
    /// that was never registered returns false and is not an error.
    pub fn remove(&mut self, pattern: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.url_pattern != pattern);
        before != self.rules.len()
    }

    /// Remove every registered rule, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.rules.len();
        self.rules.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn patterns(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.url_pattern.as_str()).collect()
    }

    /// Find the rule servicing a live request, newest registration first.
    pub fn match_request(&self, url: &str, method: &str) -> Option<&InterceptionRule> {
        self.rules.iter().rev().find(|r| r.matches(url, method))
    }

    /// CDP RequestPattern list for Fetch.enable. Matching happens in-process
    /// against this registry, so the driver pauses everything at the Request
    /// stage rather than pre-filtering with its own pattern syntax.
    pub fn fetch_patterns() -> Vec<Value> {
        vec![json!({"urlPattern": "*", "requestStage": "Request"})]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, method: Option<HttpMethod>) -> InterceptionRule {
        InterceptionRule::new(
            pattern.to_string(),
            method,
            200,
            "application/json".to_string(),
            r#"{"ok":true}"#.to_string(),
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_status_range_validation() {
        for status in [100u16, 200, 404, 599] {
            assert!(InterceptionRule::new(
                "/x".into(),
                None,
                status,
                "text/plain".into(),
                "".into(),
                BTreeMap::new()
            )
            .is_ok());
        }
        for status in [0u16, 99, 600, 1000] {
            let err = InterceptionRule::new(
                "/x".into(),
                None,
                status,
                "text/plain".into(),
                "".into(),
                BTreeMap::new(),
            )
            .unwrap_err();
            assert!(err.to_string().contains("status"));
        }
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let err = InterceptionRule::new(
            "  ".into(),
            None,
            200,
            "application/json".into(),
            "".into(),
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_path_pattern_matches_full_url() {
        let r = rule("/api/users", Some(HttpMethod::Get));
        assert!(r.matches("https://example.com/api/users", "GET"));
        assert!(!r.matches("https://example.com/api/users/42", "GET"));
    }

    #[test]
    fn test_method_mismatch_passes_through() {
        let r = rule("/api/users", Some(HttpMethod::Get));
        assert!(!r.matches("https://example.com/api/users", "POST"));
    }

    #[test]
    fn test_absent_method_matches_any() {
        let r = rule("/api/x", None);
        for method in HTTP_METHODS {
            assert!(r.matches("https://example.com/api/x", method), "{}", method);
        }
    }

    #[test]
    fn test_glob_wildcards() {
        let r = rule("*api*", None);
        assert!(r.matches("https://example.com/api/users", "GET"));
        assert!(!r.matches("https://example.com/static/app.js", "GET"));

        let r = rule("https://example.com/v?/users", None);
        assert!(r.matches("https://example.com/v1/users", "GET"));
        assert!(r.matches("https://example.com/v2/users", "GET"));
        assert!(!r.matches("https://example.com/v10/users", "GET"));
    }

    #[test]
    fn test_regex_pattern() {
        let r = rule("^https://example\\.com/api/(users|orders)$", None);
        assert!(r.matches("https://example.com/api/users", "GET"));
        assert!(r.matches("https://example.com/api/orders", "GET"));
        assert!(!r.matches("https://example.com/api/items", "GET"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = InterceptionRule::new(
            "^[unclosed".into(),
            None,
            200,
            "application/json".into(),
            "".into(),
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("url pattern"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let r = rule("https://example.com/a+b.json", None);
        assert!(r.matches("https://example.com/a+b.json", "GET"));
        assert!(!r.matches("https://example.com/aaabxjson", "GET"));
    }

    #[test]
    fn test_response_headers_content_type_first() {
        let mut extra = BTreeMap::new();
        extra.insert("X-Mock".to_string(), "1".to_string());
        let r = InterceptionRule::new(
            "/api".into(),
            None,
            201,
            "text/html".into(),
            "<p>hi</p>".into(),
            extra,
        )
        .unwrap();
        let headers = r.response_headers();
        assert_eq!(headers[0]["name"], "Content-Type");
        assert_eq!(headers[0]["value"], "text/html");
        assert_eq!(headers[1]["name"], "X-Mock");
    }

    #[test]
    fn test_transcript_reflects_rule_fields() {
        let r = rule("/api/users", Some(HttpMethod::Get));
        let lines = r.transcript();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Fetch.enable"));
        assert!(lines[1].contains("/api/users"));
        assert!(lines[1].contains("method = GET"));
        assert!(lines[1].contains("status=200"));
        assert!(lines[2].contains("Fetch.continueRequest"));
    }

    #[test]
    fn test_registry_replace_on_duplicate() {
        let mut reg = MockRegistry::new();
        assert!(!reg.insert(rule("/api/users", Some(HttpMethod::Get))));
        let mut updated = rule("/api/users", Some(HttpMethod::Get));
        updated.status = 503;
        assert!(reg.insert(updated));
        assert_eq!(reg.len(), 1);
        let matched = reg
            .match_request("https://example.com/api/users", "GET")
            .unwrap();
        assert_eq!(matched.status, 503);
    }

    #[test]
    fn test_registry_remove_idempotent() {
        let mut reg = MockRegistry::new();
        reg.insert(rule("/api/users", None));
        assert!(reg.remove("/api/users"));
        assert!(!reg.remove("/api/users"));
        assert!(!reg.remove("/never/registered"));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_registry_clear_all() {
        let mut reg = MockRegistry::new();
        reg.insert(rule("/a", None));
        reg.insert(rule("/b", None));
        reg.insert(rule("/c", None));
        assert_eq!(reg.clear(), 3);
        assert!(reg.is_empty());
        assert_eq!(reg.clear(), 0);
    }

    #[test]
    fn test_registry_newest_registration_wins() {
        let mut reg = MockRegistry::new();
        reg.insert(rule("*api*", None));
        let mut specific = rule("/api/users", None);
        specific.status = 404;
        reg.insert(specific);
        let matched = reg
            .match_request("https://example.com/api/users", "GET")
            .unwrap();
        assert_eq!(matched.status, 404);
    }

    #[test]
    fn test_registry_unmatched_request() {
        let mut reg = MockRegistry::new();
        reg.insert(rule("/api/users", Some(HttpMethod::Get)));
        assert!(reg
            .match_request("https://example.com/other", "GET")
            .is_none());
        assert!(reg
            .match_request("https://example.com/api/users", "POST")
            .is_none());
    }

    #[test]
    fn test_patterns_track_mutations() {
        let mut reg = MockRegistry::new();
        reg.insert(rule("/a", None));
        reg.insert(rule("/b", None));
        assert_eq!(reg.patterns(), vec!["/a", "/b"]);

        // Replacement moves the pattern to the newest slot, never duplicates.
        reg.insert(rule("/a", Some(HttpMethod::Get)));
        assert_eq!(reg.patterns(), vec!["/b", "/a"]);

        reg.remove("/b");
        assert_eq!(reg.patterns(), vec!["/a"]);
        reg.clear();
        assert!(reg.patterns().is_empty());
    }

    #[test]
    fn test_fetch_patterns_shape() {
        let patterns = MockRegistry::fetch_patterns();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0]["urlPattern"], "*");
        assert_eq!(patterns[0]["requestStage"], "Request");
    }

    #[test]
    fn test_http_method_parse() {
        for m in HTTP_METHODS {
            assert!(HttpMethod::parse(m).is_some(), "{}", m);
        }
        assert!(HttpMethod::parse("TRACE").is_none());
        assert!(HttpMethod::parse("get").is_none());
        assert_eq!(HttpMethod::parse("GET").unwrap().as_str(), "GET");
    }
}
