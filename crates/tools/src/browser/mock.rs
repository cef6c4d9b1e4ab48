//! Request interception tools: mock_api, clear_mock_api, set_headers.
//!
//! Each tool validates its parameters fully before touching the browser, then
//! applies a single registration/removal/replacement against the session's
//! rule table. Result payloads carry a `code` transcript of the equivalent
//! imperative CDP steps, generated from the same validated values the call
//! executes with.

use async_trait::async_trait;
use pagemock_core::{Error, Result};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

use super::ensure_manager;
use super::rules::{HttpMethod, InterceptionRule, HTTP_METHODS};
use super::session::BrowserEngine;
use crate::{Tool, ToolContext, ToolSchema};

/// Parse and validate a string→string header map parameter.
fn headers_from_params(params: &Value, field: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    match params.get(field) {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, value) in map {
                let value = value.as_str().ok_or_else(|| {
                    Error::Validation(format!(
                        "{}.{} must be a string, got {}",
                        field, name, value
                    ))
                })?;
                out.insert(name.clone(), value.to_string());
            }
        }
        Some(other) => {
            return Err(Error::Validation(format!(
                "{} must be an object of string values, got {}",
                field, other
            )));
        }
    }
    Ok(out)
}

/// Build a validated rule from mock_api parameters. Used by both validate and
/// execute, so the rule the interceptor runs with is exactly the one that was
/// checked (and the one the transcript is printed from).
fn rule_from_params(params: &Value) -> Result<InterceptionRule> {
    let url = params
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Validation("url is required and must be a string".to_string()))?;

    let method = match params.get("method") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(HttpMethod::parse(s).ok_or_else(|| {
            Error::Validation(format!(
                "method must be one of {}, got '{}'",
                HTTP_METHODS.join(", "),
                s
            ))
        })?),
        Some(other) => {
            return Err(Error::Validation(format!(
                "method must be a string, got {}",
                other
            )));
        }
    };

    let status = match params.get("status") {
        None | Some(Value::Null) => 200,
        Some(v) => {
            let n = v.as_u64().ok_or_else(|| {
                Error::Validation(format!("status must be an integer, got {}", v))
            })?;
            u16::try_from(n)
                .map_err(|_| Error::Validation(format!("status must be within 100-599, got {}", n)))?
        }
    };

    let content_type = params
        .get("content_type")
        .and_then(|v| v.as_str())
        .unwrap_or("application/json")
        .to_string();

    let body = params
        .get("body")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Validation("body is required and must be a string".to_string()))?;

    let extra_headers = headers_from_params(params, "headers")?;

    InterceptionRule::new(
        url.to_string(),
        method,
        status,
        content_type,
        body.to_string(),
        extra_headers,
    )
}

fn session_args(ctx: &ToolContext, params: &Value) -> (String, bool, BrowserEngine) {
    let session = params
        .get("session")
        .and_then(|v| v.as_str())
        .unwrap_or(&ctx.config.browser.session)
        .to_string();
    let headed = params
        .get("headed")
        .and_then(|v| v.as_bool())
        .unwrap_or(ctx.config.browser.headed);
    let engine = BrowserEngine::from_str(&ctx.config.browser.engine);
    (session, headed, engine)
}

// ─── mock_api ──────────────────────────────────────────────────────

pub struct MockApiTool;

#[async_trait]
impl Tool for MockApiTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "mock_api",
            description: "Intercept requests matching a URL pattern and fulfill them with a \
                          canned response instead of hitting the network. Patterns are globs \
                          ('*' any run, '?' one char; a leading '/' also matches the URL path \
                          alone) or raw regex when prefixed with '^'. Re-registering a pattern \
                          replaces the previous mock. Read-only from the page's perspective.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "URL pattern to intercept (glob, or regex with '^' prefix)"
                    },
                    "method": {
                        "type": "string",
                        "enum": HTTP_METHODS,
                        "description": "Only intercept this HTTP method (default: any method)"
                    },
                    "status": {
                        "type": "integer",
                        "description": "HTTP status of the mock response, 100-599 (default: 200)"
                    },
                    "content_type": {
                        "type": "string",
                        "description": "Content-Type of the mock response (default: application/json)"
                    },
                    "body": {
                        "type": "string",
                        "description": "Response body to return"
                    },
                    "headers": {
                        "type": "object",
                        "description": "Extra response headers as a string map"
                    },
                    "session": {
                        "type": "string",
                        "description": "Browser session name (default from config)"
                    },
                    "headed": {
                        "type": "boolean",
                        "description": "Run the browser with a visible window (default from config)"
                    }
                },
                "required": ["url", "body"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        rule_from_params(params).map(|_| ())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let rule = rule_from_params(&params)?;
        let (session_name, headed, engine) = session_args(&ctx, &params);

        let mgr_arc = ensure_manager(&ctx.workspace).await;
        let mut mgr_guard = mgr_arc.lock().await;
        let mgr = mgr_guard
            .as_mut()
            .ok_or_else(|| Error::Session("Session manager not initialized".to_string()))?;
        let session = mgr
            .get_or_create(
                &session_name,
                headed,
                ctx.config.browser.profile_dir.as_deref(),
                engine,
            )
            .await?;

        let pattern = rule.url_pattern.clone();
        let method = rule.method_label();
        let status = rule.status;
        let code = rule.transcript();

        // Snapshot the pattern list under the same guard as the insert so the
        // payload always reflects the state this call produced.
        let (replaced, active) = {
            let mut reg = session.mocks.write().await;
            let replaced = reg.insert(rule);
            let active: Vec<String> = reg.patterns().iter().map(|s| s.to_string()).collect();
            (replaced, active)
        };
        session.sync_interception().await?;

        Ok(json!({
            "status": format!(
                "Mock registered for {} {} -> {}{}",
                method, pattern, status,
                if replaced { " (replaced previous mock)" } else { "" }
            ),
            "pattern": pattern,
            "replaced": replaced,
            "active_mocks": active,
            "code": code,
            "capture_snapshot": false,
            "wait_network_idle": false,
        }))
    }
}

// ─── clear_mock_api ────────────────────────────────────────────────

pub struct ClearMockApiTool;

#[async_trait]
impl Tool for ClearMockApiTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "clear_mock_api",
            description: "Remove a registered API mock by its exact URL pattern, or every \
                          registered mock when no url is given. Clearing a pattern that was \
                          never registered is a no-op, not an error.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Exact URL pattern to clear (omit to clear all mocks)"
                    },
                    "session": {
                        "type": "string",
                        "description": "Browser session name (default from config)"
                    }
                },
                "required": []
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        match params.get("url") {
            None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
            Some(other) => Err(Error::Validation(format!(
                "url must be a string when present, got {}",
                other
            ))),
        }
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        self.validate(&params)?;
        let pattern = params
            .get("url")
            .and_then(|v| v.as_str())
            .map(String::from);
        let (session_name, _, _) = session_args(&ctx, &params);

        let mgr_arc = ensure_manager(&ctx.workspace).await;
        let mut mgr_guard = mgr_arc.lock().await;
        let mgr = mgr_guard
            .as_mut()
            .ok_or_else(|| Error::Session("Session manager not initialized".to_string()))?;

        // No session means no mocks to clear; do not launch a browser for a no-op.
        let session = match mgr.get_session(&session_name) {
            Some(s) => s,
            None => {
                return Ok(json!({
                    "status": "No active session; nothing to clear",
                    "removed": 0,
                    "active_mocks": [],
                    "code": clear_transcript(pattern.as_deref(), 0, true),
                    "capture_snapshot": false,
                    "wait_network_idle": false,
                }));
            }
        };

        // Removal and pattern snapshot happen under one guard, so the payload
        // cannot disagree with the state this call left behind.
        let (removed, active) = {
            let mut reg = session.mocks.write().await;
            let removed = match &pattern {
                Some(p) => {
                    if reg.remove(p) {
                        1
                    } else {
                        0
                    }
                }
                None => reg.clear(),
            };
            let active: Vec<String> = reg.patterns().iter().map(|s| s.to_string()).collect();
            (removed, active)
        };
        session.sync_interception().await?;
        let none_remain = active.is_empty();

        let status = match &pattern {
            Some(p) if removed > 0 => format!("Mock cleared for {}", p),
            Some(p) => format!("No mock registered for {} (no-op)", p),
            None => format!("Cleared all mocks ({} removed)", removed),
        };

        Ok(json!({
            "status": status,
            "removed": removed,
            "active_mocks": active,
            "code": clear_transcript(pattern.as_deref(), removed, none_remain),
            "capture_snapshot": false,
            "wait_network_idle": false,
        }))
    }
}

/// Transcript of the CDP steps a clear call performed, built from the same
/// pattern and outcome the call ran with.
fn clear_transcript(pattern: Option<&str>, removed: usize, none_remain: bool) -> Vec<String> {
    let mut lines = vec![match pattern {
        Some(p) => format!("remove interception rule [url ~ {}] (removed {})", p, removed),
        None => format!("remove all interception rules (removed {})", removed),
    }];
    if none_remain {
        lines.push("Fetch.disable".to_string());
    } else {
        lines.push(
            "Fetch.enable patterns=[{urlPattern: \"*\", requestStage: Request}]".to_string(),
        );
    }
    lines
}

// ─── set_headers ───────────────────────────────────────────────────

pub struct SetHeadersTool;

#[async_trait]
impl Tool for SetHeadersTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "set_headers",
            description: "Replace the extra HTTP headers sent with every request from the page. \
                          The whole header set is replaced, not merged; pass an empty map to \
                          clear previously set headers.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "headers": {
                        "type": "object",
                        "description": "Headers to send with every request, as a string map"
                    },
                    "session": {
                        "type": "string",
                        "description": "Browser session name (default from config)"
                    },
                    "headed": {
                        "type": "boolean",
                        "description": "Run the browser with a visible window (default from config)"
                    }
                },
                "required": ["headers"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        match params.get("headers") {
            Some(Value::Object(_)) => {
                headers_from_params(params, "headers").map(|_| ())
            }
            Some(other) => Err(Error::Validation(format!(
                "headers must be an object of string values, got {}",
                other
            ))),
            None => Err(Error::Validation(
                "headers is required and must be an object".to_string(),
            )),
        }
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        self.validate(&params)?;
        let headers: HashMap<String, String> = headers_from_params(&params, "headers")?
            .into_iter()
            .collect();
        let (session_name, headed, engine) = session_args(&ctx, &params);

        let mgr_arc = ensure_manager(&ctx.workspace).await;
        let mut mgr_guard = mgr_arc.lock().await;
        let mgr = mgr_guard
            .as_mut()
            .ok_or_else(|| Error::Session("Session manager not initialized".to_string()))?;
        let session = mgr
            .get_or_create(
                &session_name,
                headed,
                ctx.config.browser.profile_dir.as_deref(),
                engine,
            )
            .await?;

        let header_json = Value::Object(
            headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<Map<String, Value>>(),
        );
        let count = headers.len();
        session.set_extra_headers(headers).await?;

        let status = if count == 0 {
            "Extra headers cleared".to_string()
        } else {
            format!("Extra headers set ({} headers)", count)
        };

        Ok(json!({
            "status": status,
            "headers": header_json,
            "code": vec![format!("Network.setExtraHTTPHeaders headers={}", header_json)],
            "capture_snapshot": false,
            "wait_network_idle": false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_api_schema_shape() {
        let schema = MockApiTool.schema();
        assert_eq!(schema.name, "mock_api");
        let props = &schema.parameters["properties"];
        assert!(props["url"].is_object());
        assert!(props["body"].is_object());
        assert_eq!(schema.parameters["required"], json!(["url", "body"]));
        let methods: Vec<&str> = props["method"]["enum"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(methods, HTTP_METHODS);
    }

    #[test]
    fn test_mock_api_validate_minimal() {
        let params = json!({"url": "/api/users", "body": "{}"});
        assert!(MockApiTool.validate(&params).is_ok());
    }

    #[test]
    fn test_mock_api_validate_missing_required() {
        let err = MockApiTool.validate(&json!({"body": "{}"})).unwrap_err();
        assert!(err.to_string().contains("url"));
        let err = MockApiTool
            .validate(&json!({"url": "/api/users"}))
            .unwrap_err();
        assert!(err.to_string().contains("body"));
    }

    #[test]
    fn test_mock_api_validate_status_bounds() {
        let base = json!({"url": "/x", "body": ""});
        for status in [100, 200, 599] {
            let mut p = base.clone();
            p["status"] = json!(status);
            assert!(MockApiTool.validate(&p).is_ok(), "status {}", status);
        }
        for status in [0, 99, 600] {
            let mut p = base.clone();
            p["status"] = json!(status);
            let err = MockApiTool.validate(&p).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "status {}", status);
            assert!(err.to_string().contains("status"));
        }
    }

    #[test]
    fn test_mock_api_validate_bad_method() {
        let err = MockApiTool
            .validate(&json!({"url": "/x", "body": "", "method": "TRACE"}))
            .unwrap_err();
        assert!(err.to_string().contains("method"));
        // Lowercase is not in the verb set either.
        let err = MockApiTool
            .validate(&json!({"url": "/x", "body": "", "method": "get"}))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_mock_api_validate_non_string_header_value() {
        let err = MockApiTool
            .validate(&json!({
                "url": "/x",
                "body": "",
                "headers": {"X-Count": 3}
            }))
            .unwrap_err();
        assert!(err.to_string().contains("X-Count"));
    }

    #[test]
    fn test_rule_from_params_defaults() {
        let rule = rule_from_params(&json!({"url": "/api/users", "body": "{}"})).unwrap();
        assert_eq!(rule.status, 200);
        assert_eq!(rule.content_type, "application/json");
        assert!(rule.method.is_none());
    }

    #[test]
    fn test_clear_mock_api_validate() {
        assert!(ClearMockApiTool.validate(&json!({})).is_ok());
        assert!(ClearMockApiTool.validate(&json!({"url": "/api/x"})).is_ok());
        let err = ClearMockApiTool.validate(&json!({"url": 42})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_clear_transcript_from_outcome() {
        let lines = clear_transcript(Some("/api/users"), 1, true);
        assert!(lines[0].contains("/api/users"));
        assert!(lines[0].contains("removed 1"));
        assert_eq!(lines[1], "Fetch.disable");

        let lines = clear_transcript(None, 3, true);
        assert!(lines[0].contains("all interception rules"));
        assert!(lines[0].contains("removed 3"));

        let lines = clear_transcript(Some("/a"), 1, false);
        assert!(lines[1].contains("Fetch.enable"));
    }

    #[test]
    fn test_set_headers_validate() {
        assert!(SetHeadersTool
            .validate(&json!({"headers": {"Authorization": "Bearer t"}}))
            .is_ok());
        assert!(SetHeadersTool.validate(&json!({"headers": {}})).is_ok());

        let err = SetHeadersTool.validate(&json!({})).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = SetHeadersTool
            .validate(&json!({"headers": "Authorization: x"}))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = SetHeadersTool
            .validate(&json!({"headers": {"X-N": 1}}))
            .unwrap_err();
        assert!(err.to_string().contains("X-N"));
    }

    #[test]
    fn test_tool_schemas_mark_read_only_behavior() {
        // The flags live in result payloads; the schemas themselves must not
        // require any page-mutation parameters.
        for schema in [
            MockApiTool.schema(),
            ClearMockApiTool.schema(),
            SetHeadersTool.schema(),
        ] {
            assert_eq!(schema.parameters["type"], "object");
            assert!(!schema.description.is_empty());
        }
    }
}
