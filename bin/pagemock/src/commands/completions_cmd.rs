use clap_complete::{generate, Shell};

/// Generate shell completion scripts.
///
/// Re-creates a minimal CLI definition to generate completions without a
/// circular dependency on the main Cli struct.
pub async fn run(shell: &str) -> anyhow::Result<()> {
    let shell = match shell.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "powershell" | "ps" => Shell::PowerShell,
        "elvish" => Shell::Elvish,
        _ => {
            anyhow::bail!(
                "Unsupported shell: {}. Options: bash, zsh, fish, powershell, elvish",
                shell
            );
        }
    };

    let mut cmd = build_cli();
    generate(shell, &mut cmd, "pagemock", &mut std::io::stdout());

    Ok(())
}

/// Build a minimal CLI definition for completion generation.
fn build_cli() -> clap::Command {
    clap::Command::new("pagemock")
        .about("Browser request interception: mock APIs and set headers on a live page")
        .subcommand(
            clap::Command::new("tools")
                .about("Inspect registered tools")
                .subcommand(clap::Command::new("list").about("List all tools"))
                .subcommand(clap::Command::new("info").about("Show tool details")),
        )
        .subcommand(
            clap::Command::new("run")
                .about("Execute a tool directly")
                .subcommand(clap::Command::new("tool").about("Run a tool by name")),
        )
        .subcommand(clap::Command::new("completions").about("Generate shell completions"))
}
