use pagemock_tools::ToolRegistry;
use serde_json::Value;

fn schema_function(schema: &Value) -> &Value {
    schema.get("function").unwrap_or(schema)
}

/// List all registered tools.
pub async fn list() -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();
    let schemas = registry.get_tool_schemas();

    println!();
    println!("Registered tools ({} total)", schemas.len());
    println!();

    for schema in &schemas {
        let func = schema_function(schema);
        let name = func["name"].as_str().unwrap_or("");
        let desc = func["description"].as_str().unwrap_or("");
        let short_desc: String = desc.chars().take(72).collect();
        let ellipsis = if desc.chars().count() > 72 { "..." } else { "" };
        println!("  {:<16} {}{}", name, short_desc, ellipsis);
    }
    println!();

    Ok(())
}

/// Show detailed info for a specific tool.
pub async fn info(tool_name: &str) -> anyhow::Result<()> {
    let registry = ToolRegistry::with_defaults();
    let schemas = registry.get_tool_schemas();

    let schema = schemas
        .iter()
        .find(|s| schema_function(s)["name"].as_str() == Some(tool_name));

    let schema = match schema {
        Some(s) => s,
        None => {
            eprintln!("Tool '{}' not found.", tool_name);
            eprintln!();
            eprintln!("Use `pagemock tools list` to see all available tools.");
            std::process::exit(1);
        }
    };

    let func = schema_function(schema);
    println!();
    println!("{}", func["name"].as_str().unwrap_or(""));
    println!();
    println!("  Description: {}", func["description"].as_str().unwrap_or(""));
    println!();

    if let Some(params) = func.get("parameters") {
        println!("  Parameters:");
        let required: Vec<&str> = params
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        if let Some(props) = params.get("properties").and_then(|p| p.as_object()) {
            for (key, val) in props {
                let typ = val.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                let desc = val.get("description").and_then(|d| d.as_str()).unwrap_or("");
                let req = if required.contains(&key.as_str()) {
                    " (required)"
                } else {
                    ""
                };

                let enum_str = val
                    .get("enum")
                    .and_then(|e| e.as_array())
                    .map(|arr| {
                        let vals: Vec<&str> = arr.iter().filter_map(|v| v.as_str()).collect();
                        format!(" [{}]", vals.join("|"))
                    })
                    .unwrap_or_default();

                println!("    {:<16} {:<8}{}{}", key, typ, req, enum_str);
                if !desc.is_empty() {
                    println!("      {}", desc);
                }
            }
        }
    }
    println!();

    Ok(())
}
