//! Warden - Main entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use warden::cli::{
    Cli, Command, SandboxOptions, run_check_command, run_ops_command, run_resolve_command,
    run_sandbox,
};

/// Initialize tracing for simple CLI commands (warn level, no fancy layers).
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
}

/// Tracing for interactive sessions, with the audit target always on.
fn init_session_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warden=info,audit=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check { probe } => {
            init_cli_tracing();
            run_check_command(probe).await
        }
        Command::Ops { verbose, json } => {
            init_cli_tracing();
            run_ops_command(verbose, json)
        }
        Command::Resolve { text, guild } => {
            init_cli_tracing();
            run_resolve_command(&text, guild)
        }
        Command::Sandbox {
            user,
            admin,
            offline,
        } => {
            init_session_tracing();
            tracing::info!("Starting Warden sandbox...");
            run_sandbox(SandboxOptions {
                user,
                admin,
                offline,
            })
            .await
        }
    }
}
