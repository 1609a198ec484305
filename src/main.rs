//! # docsync CLI
//!
//! ```bash
//! docsync --config ./config/docsync.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync init [--reset]` | Create (or recreate) the index schema |
//! | `docsync sites` | List configured sites |
//! | `docsync sync <site>\|all` | Reconcile the index with the source |
//! | `docsync search "<query>"` | Search indexed documents |
//! | `docsync serve` | Start the HTTP server |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use docsync::{config, ingest, migrate, search, server, sites};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docsync keeps a full-text document index in sync with Markdown files
/// in GitHub repositories or local directories.
#[derive(Parser)]
#[command(name = "docsync", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent. With `--reset`, drops all indexed documents first.
    Init {
        /// Drop and recreate the index tables.
        #[arg(long)]
        reset: bool,
    },

    /// List configured sites.
    Sites,

    /// Reconcile the index with a site's source tree.
    Sync {
        /// Site name, or `all`.
        site: String,

        /// Delete every document of the site and re-upload from scratch.
        #[arg(long)]
        force: bool,

        /// Classify only; print what would change without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search indexed documents.
    Search {
        /// The search query. `*` matches everything.
        query: String,

        /// Restrict to a site (repeatable). Defaults to all sites.
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Result order: `score` or `title`.
        #[arg(long, default_value = "score")]
        order: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init { reset } => {
            migrate::run_migrations(&cfg, reset).await?;
            if reset {
                println!("Database reset and initialized successfully.");
            } else {
                println!("Database initialized successfully.");
            }
        }
        Commands::Sites => {
            sites::list_sites(&cfg)?;
        }
        Commands::Sync {
            site,
            force,
            dry_run,
        } => {
            ingest::run_sync(&cfg, &site, force, dry_run).await?;
        }
        Commands::Search {
            query,
            sites,
            order,
            limit,
        } => {
            search::run_search(&cfg, &query, sites, &order, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
