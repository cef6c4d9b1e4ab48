pub mod browser;
pub mod registry;

use async_trait::async_trait;
use pagemock_core::types::PermissionSet;
use pagemock_core::{Config, Result};
use serde_json::Value;
use std::path::PathBuf;

pub use registry::ToolRegistry;

/// Execution context handed to every tool call.
#[derive(Clone)]
pub struct ToolContext {
    pub workspace: PathBuf,
    pub session_key: String,
    pub config: Config,
    pub permissions: PermissionSet,
}

pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;
    fn validate(&self, params: &Value) -> Result<()>;
    fn required_permissions(&self, _params: &Value) -> PermissionSet {
        PermissionSet::new()
    }
    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value>;
}
