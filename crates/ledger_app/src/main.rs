//! Command-line front end for reviewing processed bank statements.
mod commands;
mod config;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ledger_logging::ledger_info;
use log::LevelFilter;

use crate::commands::{AppContext, FeedArgs};
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Follow statement processing jobs and review their rows")]
struct Cli {
    /// RON config file; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the config file
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Session token sent as the session cookie
    #[arg(long, global = true, env = "LEDGER_SESSION")]
    session: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the cached job list against the backend and print it
    Reconcile,

    /// Follow a job until it finishes, then print its first page
    Watch {
        job_id: String,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },

    /// Ask the backend to start a job, then follow it
    Start {
        job_id: String,

        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },

    /// List external statement attachments
    Feed {
        /// Page size, clamped to 1..=200
        #[arg(long)]
        limit: Option<u32>,

        /// Extra pages to load after the first
        #[arg(long, default_value_t = 0)]
        more: u32,

        /// Create a processing job for this attachment
        #[arg(long)]
        process: Option<String>,

        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(session) = cli.session {
        config.session_token = Some(session);
    }

    ledger_engine::ensure_cache_dir(&config.cache_dir)?;
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    ledger_logging::initialize(
        config.log_destination.into(),
        level,
        &config.cache_dir.join("ledger.log"),
    );
    ledger_info!("Using backend {}", config.base_url);

    let ctx = AppContext::new(config)?;
    match cli.command {
        Commands::Reconcile => commands::reconcile(&ctx).await,
        Commands::Watch { job_id, timeout } => {
            commands::watch(&ctx, job_id, false, Duration::from_secs(timeout)).await
        }
        Commands::Start { job_id, timeout } => {
            commands::watch(&ctx, job_id, true, Duration::from_secs(timeout)).await
        }
        Commands::Feed {
            limit,
            more,
            process,
            timeout,
        } => {
            commands::feed(
                &ctx,
                FeedArgs {
                    limit,
                    offset_pages: more,
                    process,
                    wait: Duration::from_secs(timeout),
                },
            )
            .await
        }
    }
}
