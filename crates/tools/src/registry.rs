use pagemock_core::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::browser::{ClearMockApiTool, MockApiTool, SetHeadersTool};
use crate::{Tool, ToolContext};

#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Request interception tools
        registry.register(Arc::new(MockApiTool));
        registry.register(Arc::new(ClearMockApiTool));
        registry.register(Arc::new(SetHeadersTool));

        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        debug!(name = schema.name, "Registering tool");
        self.tools.insert(schema.name.to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn get_tool_schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                let schema = tool.schema();
                json!({
                    "type": "function",
                    "function": {
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.parameters
                    }
                })
            })
            .collect()
    }

    /// Get tool schemas filtered by a list of tool names.
    pub fn get_filtered_schemas(&self, names: &[&str]) -> Vec<Value> {
        self.tools
            .iter()
            .filter(|(name, _)| names.contains(&name.as_str()))
            .map(|(_, tool)| {
                let schema = tool.schema();
                json!({
                    "type": "function",
                    "function": {
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.parameters
                    }
                })
            })
            .collect()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub async fn execute(&self, name: &str, ctx: ToolContext, params: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::Tool(format!("Unknown tool: {}", name)))?;

        // Validate parameters before any side effect
        if let Err(e) = tool.validate(&params) {
            warn!(tool = name, error = %e, "Tool validation failed");
            return Err(e);
        }

        // Check permissions
        let required = tool.required_permissions(&params);
        if !required.is_subset_of(&ctx.permissions) {
            warn!(tool = name, "Permission denied: insufficient permissions");
            return Err(Error::Tool(format!(
                "Permission denied: tool '{}' requires permissions that are not granted",
                name
            )));
        }

        debug!(tool = name, "Executing tool");
        tool.execute(ctx, params).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_new_empty() {
        let reg = ToolRegistry::new();
        assert!(reg.tool_names().is_empty());
        assert!(reg.get("mock_api").is_none());
    }

    #[test]
    fn test_registry_with_defaults_has_interception_tools() {
        let reg = ToolRegistry::with_defaults();
        let names = reg.tool_names();
        assert!(names.contains(&"mock_api".to_string()));
        assert!(names.contains(&"clear_mock_api".to_string()));
        assert!(names.contains(&"set_headers".to_string()));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_registry_get_tool_schemas() {
        let reg = ToolRegistry::with_defaults();
        let schemas = reg.get_tool_schemas();
        assert_eq!(schemas.len(), 3);
        for schema in &schemas {
            assert_eq!(schema["type"], "function");
            assert!(schema["function"]["name"].is_string());
            assert!(schema["function"]["description"].is_string());
        }
    }

    #[test]
    fn test_registry_get_filtered_schemas() {
        let reg = ToolRegistry::with_defaults();
        let filtered = reg.get_filtered_schemas(&["mock_api", "set_headers"]);
        assert_eq!(filtered.len(), 2);
        assert!(reg.get_filtered_schemas(&["nonexistent"]).is_empty());
    }

    #[tokio::test]
    async fn test_registry_execute_unknown_tool() {
        let reg = ToolRegistry::with_defaults();
        let ctx = ToolContext {
            workspace: std::path::PathBuf::from("/tmp"),
            session_key: "test".to_string(),
            config: pagemock_core::Config::default(),
            permissions: pagemock_core::types::PermissionSet::new(),
        };
        let err = reg.execute("no_such_tool", ctx, json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_registry_execute_rejects_invalid_params() {
        let reg = ToolRegistry::with_defaults();
        let ctx = ToolContext {
            workspace: std::path::PathBuf::from("/tmp"),
            session_key: "test".to_string(),
            config: pagemock_core::Config::default(),
            permissions: pagemock_core::types::PermissionSet::new(),
        };
        // Missing required url/body fails in validate, before any browser launch.
        let err = reg.execute("mock_api", ctx, json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
