//! Teller CLI
//!
//! Command-line tools for the Teller ledger.
//!
//! # Commands
//!
//! - `serve` - Run the TCP server over a ledger directory
//! - `seed` - Create the standard demo accounts in a fresh ledger
//! - `accounts` - List account records
//! - `wal` - Dump the write-ahead log for debugging

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Teller command-line ledger tools.
#[derive(Parser)]
#[command(name = "teller")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the ledger data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the TCP server over a ledger directory
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Maximum concurrent connections
        #[arg(long, default_value = "1000")]
        max_connections: usize,
    },

    /// Create the standard demo accounts in a fresh ledger
    Seed,

    /// List account records
    Accounts {
        /// Include deactivated accounts
        #[arg(short, long)]
        all: bool,
    },

    /// Dump the write-ahead log for debugging
    Wal {
        /// Show only the last N lines
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            max_connections,
        } => {
            let path = cli.path.ok_or("Ledger path required for serve")?;
            commands::serve::run(&path, bind, max_connections)?;
        }
        Commands::Seed => {
            let path = cli.path.ok_or("Ledger path required for seed")?;
            commands::seed::run(&path)?;
        }
        Commands::Accounts { all } => {
            let path = cli.path.ok_or("Ledger path required for accounts")?;
            commands::accounts::run(&path, all)?;
        }
        Commands::Wal { limit } => {
            let path = cli.path.ok_or("Ledger path required for wal")?;
            commands::wal::run(&path, limit)?;
        }
    }

    Ok(())
}
