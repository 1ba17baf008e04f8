//! baton - claim tasks so cooperating agents don't step on each other.
//!
//! Usage:
//!   baton --owner agent-A claim build-1
//!   baton --owner agent-A release build-1
//!   baton --owner agent-A list
//!   baton sweep [--watch]
//!   baton status [--json]
//!
//! # Environment Variables
//!
//! - `BATON_OWNER` - caller identity (trusted as given, never authenticated)
//! - `BATON_ROOT` - shared store directory (default: .baton)
//! - `BATON_TTL_SECS` - default lease TTL (default: 300)
//! - `RUST_LOG` - log filter, overrides `--log-level`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use baton_core::app::{BoardBuilder, ClaimBoard, SweepLoop};
use baton_core::config::BoardConfig;
use baton_core::domain::{ClaimError, OwnerId, TaskKey};
use baton_core::ports::{OwnerIdGenerator, SystemClock, UlidOwnerIdGenerator};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod render;

/// Exit code when the task is held by someone else.
const EXIT_ALREADY_CLAIMED: u8 = 3;
const EXIT_NOT_FOUND: u8 = 4;
const EXIT_NOT_OWNER: u8 = 5;

/// baton - lease-based task claims
#[derive(Parser, Debug)]
#[command(name = "baton")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file (default: ./baton.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shared store directory, overrides config and BATON_ROOT
    #[arg(long)]
    root: Option<PathBuf>,

    /// Caller identity
    #[arg(long, env = "BATON_OWNER")]
    owner: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Claim a task for --owner
    Claim {
        task: String,

        /// Lease TTL in seconds (default from config)
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Release a task held by --owner
    Release { task: String },

    /// List the tasks in --owner's index
    #[command(alias = "ls")]
    List,

    /// Show every lease in the store
    Leases,

    /// Reclaim expired leases
    Sweep {
        /// Keep sweeping until interrupted
        #[arg(long)]
        watch: bool,

        /// Seconds between sweeps in watch mode (default from config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Summarise the store
    Status,

    /// Print a fresh owner id
    NewOwner,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Commands::NewOwner = cli.command {
        let owner = UlidOwnerIdGenerator::new(SystemClock).generate_owner_id();
        println!("{owner}");
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = BoardConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    let board = BoardBuilder::from_config(&config)
        .and_then(BoardBuilder::build)
        .with_context(|| format!("failed to open board at {}", config.root.display()))?;

    match &cli.command {
        Commands::Claim { task, ttl } => {
            let task = parse_task(task)?;
            let owner = require_owner(&cli)?;
            let ttl = ttl.unwrap_or(board.default_ttl_secs());
            outcome(board.claim_with_ttl(&task, &owner, ttl), |lease| {
                render::lease(lease, cli.json)
            })
        }
        Commands::Release { task } => {
            let task = parse_task(task)?;
            let owner = require_owner(&cli)?;
            outcome(board.release(&task, &owner), |lease| {
                render::released(lease, cli.json)
            })
        }
        Commands::List => {
            let owner = require_owner(&cli)?;
            let rows = board.list_tasks(&owner)?.to_vec()?;
            render::listing(&owner, &rows, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Leases => {
            render::leases(&board.leases()?, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sweep { watch, interval } => {
            if *watch {
                let every = interval.unwrap_or(config.sweep_interval_secs).max(1);
                watch_sweeps(board, Duration::from_secs(every), cli.json).await?;
            } else {
                render::sweep(&board.sweep()?, cli.json)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            render::status(&board.status()?, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::NewOwner => Ok(ExitCode::SUCCESS),
    }
}

/// Maps contention outcomes to exit codes; only storage failures become errors.
fn outcome<T>(
    result: Result<T, ClaimError>,
    on_success: impl FnOnce(&T) -> Result<()>,
) -> Result<ExitCode> {
    match result {
        Ok(value) => {
            on_success(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ ClaimError::StorageUnavailable(_)) => Err(err.into()),
        Err(err) => {
            eprintln!("{err}");
            let code = match err {
                ClaimError::AlreadyClaimed { .. } => EXIT_ALREADY_CLAIMED,
                ClaimError::NotFound(_) => EXIT_NOT_FOUND,
                ClaimError::NotOwner { .. } => EXIT_NOT_OWNER,
                ClaimError::StorageUnavailable(_) => 1,
            };
            Ok(ExitCode::from(code))
        }
    }
}

async fn watch_sweeps(board: ClaimBoard, every: Duration, json: bool) -> Result<()> {
    info!(every_secs = every.as_secs(), "watching for expired leases");
    let sweeper = SweepLoop::spawn_with(Arc::new(board), every, move |report| {
        if report.count() > 0 || json {
            // stdout closed is not worth stopping the loop for
            let _ = render::sweep(report, json);
        }
    });
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    sweeper.shutdown_and_join().await;
    Ok(())
}

fn parse_task(raw: &str) -> Result<TaskKey> {
    TaskKey::new(raw).context("invalid task")
}

fn require_owner(cli: &Cli) -> Result<OwnerId> {
    let raw = cli
        .owner
        .as_deref()
        .context("no owner given: pass --owner or set BATON_OWNER (see `baton new-owner`)")?;
    OwnerId::new(raw).context("invalid owner")
}
