//! StateJournal CLI
//!
//! Command-line tools for StateJournal journals. Every command reads a copy
//! of the logs, so running them never repairs or changes a journal.
//!
//! # Commands
//!
//! - `inspect` - Show what opening the journal would recover
//! - `verify` - Check every frame of both logs
//! - `dump-meta` - List meta commit records for debugging

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// StateJournal command-line tools.
#[derive(Parser)]
#[command(name = "statejournal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the journal directory
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
    /// Show the recovered state and log statistics
    Inspect {
        /// List every indexed object
        #[arg(short, long)]
        objects: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify journal integrity
    Verify {
        /// Check the data log
        #[arg(short, long)]
        data: bool,

        /// Check the meta log
        #[arg(short, long)]
        meta: bool,

        /// Check all (default if no flags specified)
        #[arg(short, long)]
        all: bool,
    },

    /// Dump meta commit records for debugging
    DumpMeta {
        /// Show only the newest records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
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
        Commands::Inspect { objects, format } => {
            let path = cli.path.ok_or("Journal path required for inspect")?;
            commands::inspect::run(&path, objects, &format)?;
        }
        Commands::Verify { data, meta, all } => {
            let path = cli.path.ok_or("Journal path required for verify")?;
            let check_all = all || (!data && !meta);
            commands::verify::run(&path, data || check_all, meta || check_all)?;
        }
        Commands::DumpMeta { limit, format } => {
            let path = cli.path.ok_or("Journal path required for dump-meta")?;
            commands::dump_meta::run(&path, limit, &format)?;
        }
        Commands::Version => {
            println!("StateJournal CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("StateJournal Core v{}", statejournal_core::VERSION);
        }
    }

    Ok(())
}
