//! # Collections Search CLI (`collsearch`)
//!
//! ## Usage
//!
//! ```bash
//! collsearch --config ./config/collsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `collsearch init` | Create the SQLite database and run schema migrations |
//! | `collsearch import <file>` | Load a JSON export of users, collections, items and comments |
//! | `collsearch search "<query>"` | Search items, tags and comments |
//! | `collsearch stats` | Show entity counts |
//! | `collsearch serve` | Start the HTTP search server |
//!
//! ## Examples
//!
//! ```bash
//! collsearch init
//! collsearch import ./demos/export.json
//! collsearch search "brass compass" --page 2
//! collsearch search lighthouse --json
//! RUST_LOG=collections_search_core=debug collsearch search lighthouse
//! collsearch serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use collections_search::{config, import, migrate, search, server, stats};

/// Collections Search CLI: federated full-text search over items, tags and
/// comments of a collections application.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "collsearch",
    about = "Collections Search: federated search over items, tags and comments",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/collsearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, the entity tables and the
    /// full-text indexes. Safe to run repeatedly.
    Init,

    /// Import a JSON export into the database.
    ///
    /// Tags are matched by normalized value, so re-importing the same
    /// export does not duplicate them.
    Import {
        /// Path to the export file.
        file: PathBuf,
    },

    /// Search items, tags and comments.
    Search {
        /// Free-text query; terms are matched independently.
        query: String,

        /// Page number, starting at 1.
        #[arg(long, default_value_t = 1)]
        page: i64,

        /// Print the page as the JSON body `GET /api/search` would return.
        #[arg(long)]
        json: bool,
    },

    /// Show per-entity counts.
    Stats,

    /// Start the HTTP search server on `[server].bind`.
    Serve,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.log.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Search { query, page, json } => {
            search::run_search(&cfg, &query, page, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
