//! Depviz CLI - Python import graphs from the command line.
//!
//! Builds (or loads from cache) the dependency graph of an entry file and
//! prints it, its cycles or its layout.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// Depviz: Python import dependency graphs.
#[derive(Parser)]
#[command(name = "depviz")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to config.yaml in the support directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dependency graph of an entry file and print it by level
    Analyze {
        /// Entry file
        entry: PathBuf,

        /// Project root (defaults to the remembered root, then the entry's directory)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Ignore and do not write the graph cache
        #[arg(long)]
        no_cache: bool,
    },

    /// List the resolved imports of one file
    Imports {
        /// Python file
        file: PathBuf,

        /// Project root (defaults to the remembered root, then the file's directory)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Print node positions as JSON
    Layout {
        /// Entry file
        entry: PathBuf,

        /// Project root (defaults to the remembered root, then the entry's directory)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Simulation ticks to run after the shell layout
        #[arg(short, long, default_value = "0")]
        ticks: u32,
    },

    /// Detect circular imports
    Cycles {
        /// Entry file
        entry: PathBuf,

        /// Project root (defaults to the remembered root, then the entry's directory)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Inspect or clear the graph cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show the cache directory
    Path,
    /// Delete every cached graph
    Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            for cause in e.chain().skip(1) {
                eprintln!("  {}: {cause}", "caused by".dimmed());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut ctx = cli::Context::load(cli.config.as_deref()).await?;
    match cli.command {
        Commands::Analyze {
            entry,
            root,
            no_cache,
        } => cli::analyze::run(&mut ctx, &entry, root, no_cache).await,
        Commands::Imports { file, root } => cli::imports::run(&ctx, &file, root),
        Commands::Layout { entry, root, ticks } => {
            cli::layout::run(&mut ctx, &entry, root, ticks).await
        }
        Commands::Cycles { entry, root } => cli::cycles::run(&mut ctx, &entry, root).await,
        Commands::Cache { action } => match action {
            CacheAction::Path => cli::cache::path(&ctx),
            CacheAction::Clear => cli::cache::clear(&ctx),
        },
    }
}
