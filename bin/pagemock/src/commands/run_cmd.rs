use pagemock_core::{Config, Paths};
use pagemock_tools::{ToolContext, ToolRegistry};
use serde_json::Value;

/// Run a tool directly with JSON params.
pub async fn tool(tool_name: &str, params_json: &str, session: Option<&str>) -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();
    let paths = Paths::new();
    paths.ensure_dirs()?;

    let tool = registry
        .get(tool_name)
        .ok_or_else(|| anyhow::anyhow!("Tool '{}' not found", tool_name))?;

    let mut params: Value = serde_json::from_str(params_json)
        .map_err(|e| anyhow::anyhow!("Failed to parse JSON params: {}", e))?;

    if let Some(session) = session {
        params["session"] = Value::String(session.to_string());
    }

    // Validate before launching anything
    if let Err(e) = tool.validate(&params) {
        eprintln!("Parameter validation failed: {}", e);
        std::process::exit(1);
    }

    let ctx = ToolContext {
        workspace: paths.base.clone(),
        session_key: "cli:run".to_string(),
        config: Config::load_or_default(&paths)?,
        permissions: pagemock_core::types::PermissionSet::new(),
    };

    tracing::debug!(tool = tool_name, "Dispatching tool from CLI");
    let result = tool.execute(ctx, params).await;

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Err(e) => {
            eprintln!("Execution failed: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
