//! CLI command handling.
//!
//! Provides subcommands for:
//! - Checking configuration and provider reachability (`check`)
//! - Listing the operation catalog (`ops`)
//! - Showing how a phrase resolves without executing it (`resolve`)
//! - Driving the dispatcher against an in-memory server (`sandbox`)

mod ops;
mod sandbox;
mod status;

pub use ops::{run_ops_command, run_resolve_command};
pub use sandbox::{ConsoleSurface, SandboxOptions, run_sandbox};
pub use status::run_check_command;

use clap::{Parser, Subcommand};

use crate::platform::{GuildId, UserId};

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Natural-language server administration with confirmed destructive operations")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate configuration and report which providers are set up
    Check {
        /// Also send a one-line probe to the provider chain
        #[arg(long)]
        probe: bool,
    },

    /// List catalog operations
    Ops {
        /// Show parameters for each operation
        #[arg(short, long)]
        verbose: bool,

        /// Emit JSON tool definitions instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Resolve a phrase with the pattern matcher and print the result as JSON
    Resolve {
        /// Phrase to resolve, e.g. "create channels called a, b and c"
        text: String,

        /// Server id to bind into the arguments
        #[arg(long, default_value = "1")]
        guild: GuildId,
    },

    /// Interactive session against an in-memory demo server
    Sandbox {
        /// Act as this user id (defaults to the configured owner, or 900)
        #[arg(long)]
        user: Option<UserId>,

        /// Treat the sandbox user as a server administrator
        #[arg(long)]
        admin: bool,

        /// Do not use language-model providers even if configured
        #[arg(long)]
        offline: bool,
    },
}
