//! txscope CLI
//!
//! Runs a unit of work against an in-memory database inside one scoped
//! transaction and reports how it was resolved.
//!
//! # Commands
//!
//! - `run` - Execute statements as one unit of work
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use txscope_core::IsolationLevel;

/// Scoped transaction runner.
#[derive(Parser)]
#[command(name = "txscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute statements as one unit of work
    Run {
        /// Statements to execute, in order (e.g. "SET a 1")
        statements: Vec<String>,

        /// Read additional statements from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Initial entries as key=value
        #[arg(short, long)]
        seed: Vec<String>,

        /// Isolation level of the transaction
        #[arg(short, long, value_enum, default_value = "read-committed")]
        isolation: Isolation,

        /// Begin a read-only transaction
        #[arg(long)]
        read_only: bool,

        /// Fail the unit of work after all statements ran
        #[arg(long)]
        fail: bool,

        /// Make beginning the transaction fail
        #[arg(long)]
        fail_begin: bool,

        /// Make the commit fail
        #[arg(long)]
        fail_commit: bool,

        /// Make the rollback fail
        #[arg(long)]
        fail_rollback: bool,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum Isolation {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl From<Isolation> for IsolationLevel {
    fn from(value: Isolation) -> Self {
        match value {
            Isolation::ReadCommitted => Self::ReadCommitted,
            Isolation::RepeatableRead => Self::RepeatableRead,
            Isolation::Serializable => Self::Serializable,
        }
    }
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
        Commands::Run {
            mut statements,
            file,
            seed,
            isolation,
            read_only,
            fail,
            fail_begin,
            fail_commit,
            fail_rollback,
            format,
        } => {
            if let Some(path) = file {
                statements.extend(commands::run::read_script(&path)?);
            }
            let args = commands::run::RunArgs {
                statements,
                seed: commands::run::parse_seed(&seed)?,
                isolation: isolation.into(),
                read_only,
                fail,
                faults: commands::run::Faults {
                    begin: fail_begin,
                    commit: fail_commit,
                    rollback: fail_rollback,
                },
            };
            commands::run::run(&args, &format)?;
        }
        Commands::Version => {
            println!("txscope CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("txscope core v{}", txscope_core::VERSION);
        }
    }

    Ok(())
}
