//! # Rural Gazette CLI (`gazette`)
//!
//! Runs the bulletin ingestion pipeline for one or all sources, and exposes
//! the store to the downstream summarization stage.
//!
//! ## Usage
//!
//! ```bash
//! gazette --config ./config/gazette.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gazette init` | Create the SQLite database and schema |
//! | `gazette sources` | List built-in sources and whether they are configured |
//! | `gazette ingest <source\|all>` | Run the pipeline for a bulletin date |
//! | `gazette stats` | Alert counts per source and state, last runs |
//! | `gazette alerts pending` | Pending alerts awaiting summarization |
//! | `gazette serve` | Start the HTTP trigger server |
//!
//! ## Examples
//!
//! ```bash
//! gazette init
//! gazette ingest boja --date 20240115
//! gazette ingest all --json
//! gazette alerts pending --limit 20
//! ```
//!
//! Logs go to stderr and are controlled by `RUST_LOG`
//! (default `rural_gazette=info`). Command output goes to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rural_gazette::{alerts, config, ingest, migrate, server, sources, stats};

/// Rural Gazette: official bulletin ingestion for an agrarian audience.
#[derive(Parser)]
#[command(
    name = "gazette",
    about = "Rural Gazette: ingest official bulletins and keep the provisions that matter to rural readers",
    version,
    long_about = "Rural Gazette locates each day's official bulletins, extracts and segments their \
    provisions, keeps the ones relevant to agriculture and rural life, and stores new ones for \
    downstream summarization."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gazette.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// List built-in bulletin sources and their status.
    Sources,

    /// Run the ingestion pipeline.
    Ingest {
        /// Source tag (`boe`, `boja`, `boa`, `bocyl`, `docm`, `doe`) or `all`.
        source: String,

        /// Bulletin date, `YYYYMMDD` or `YYYY-MM-DD`. Defaults to today.
        #[arg(long)]
        date: Option<String>,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show alert counts and the last run per source.
    Stats,

    /// Inspect stored alerts.
    Alerts {
        #[command(subcommand)]
        action: AlertsAction,
    },

    /// Start the HTTP trigger server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum AlertsAction {
    /// List the oldest pending alerts.
    Pending {
        /// Maximum number of alerts to list.
        #[arg(long, default_value_t = alerts::DEFAULT_PENDING_LIMIT)]
        limit: i64,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rural_gazette=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Ingest { source, date, json } => {
            ingest::run_ingest(&cfg, &source, date.as_deref(), json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Alerts { action } => match action {
            AlertsAction::Pending { limit, json } => {
                alerts::run_pending(&cfg, limit, json).await?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
