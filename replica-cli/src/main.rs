//! Replica — operator CLI for the Turso embedded-replica sync daemon.
//!
//! # Usage
//!
//! ```text
//! replica check [--force-sync] [--detailed] [--reset-status] [--json]
//! replica query <sql> [params...] [--json]
//! replica daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, daemon::DaemonCommand, query::QueryArgs};

#[derive(Parser, Debug)]
#[command(
    name = "replica",
    version,
    about = "Inspect and drive background sync of a Turso embedded replica",
    long_about = None,
)]
struct Cli {
    /// Emit tracing output on stderr (filtered by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show sync status, optionally forcing a sync or running verification.
    Check(CheckArgs),

    /// Run one SQL statement against the replica, then sync.
    Query(QueryArgs),

    /// Manage the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        replica_daemon::init_tracing();
    }

    match cli.command {
        Commands::Check(args) => args.run(),
        Commands::Query(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
