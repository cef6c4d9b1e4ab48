mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pagemock")]
#[command(about = "Browser request interception: mock APIs and set headers on a live page", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect registered tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },

    /// Execute a tool directly
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

#[derive(Subcommand)]
enum ToolsCommands {
    /// List all registered tools
    List,
    /// Show detailed info for a specific tool
    Info {
        /// Tool name
        tool_name: String,
    },
}

#[derive(Subcommand)]
enum RunCommands {
    /// Run a tool by name with JSON params
    Tool {
        /// Tool name (mock_api, clear_mock_api, set_headers)
        tool_name: String,
        /// JSON parameters (e.g. '{"url":"/api/users","body":"{}"}')
        params: String,
        /// Browser session name
        #[arg(short, long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Tools { command } => match command {
            ToolsCommands::List => {
                commands::tools_cmd::list().await?;
            }
            ToolsCommands::Info { tool_name } => {
                commands::tools_cmd::info(&tool_name).await?;
            }
        },

        Commands::Run { command } => match command {
            RunCommands::Tool {
                tool_name,
                params,
                session,
            } => {
                commands::run_cmd::tool(&tool_name, &params, session.as_deref()).await?;
            }
        },

        Commands::Completions { shell } => {
            commands::completions_cmd::run(&shell).await?;
        }
    }

    Ok(())
}
