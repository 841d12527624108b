//! lendboard operator CLI.
//!
//! One-shot counterparts of what the web server does in the background:
//! run a sync cycle, check credentials, and inspect the local store.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lendboard_client::{ApiClient, CacheSynchronizer};
use lendboard_core::config::LOG_JSON_ENV;
use lendboard_core::{AppConfig, Collection, Store};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lendboard", version, about = "Lending dashboard operator commands")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Refresh the notes and listings caches once
    Sync {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Exchange the configured credentials for a token and report the result
    CheckAuth,

    /// Show cache sizes and the latest sync run per collection
    Status,

    /// List stored strategies
    Strategies {
        /// Only show active strategies
        #[arg(long)]
        active: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if std::env::var_os(LOG_JSON_ENV).is_some() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_store(config: &AppConfig) -> Result<Store> {
    Store::open(&config.db_path)
        .await
        .with_context(|| format!("opening database {}", config.db_path.display()))
}

async fn sync(config: &AppConfig, json: bool) -> Result<bool> {
    let client = ApiClient::from_app_config(config)?;
    let store = open_store(config).await?;
    let synchronizer = CacheSynchronizer::new(Arc::new(client), store);

    let report = synchronizer.run_once().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for outcome in &report.outcomes {
            match (&outcome.row_count, &outcome.error) {
                (_, Some(err)) => println!("{:<9} FAILED  {err}", outcome.collection),
                (rows, None) => println!("{:<9} ok      {} rows", outcome.collection, rows.unwrap_or(0)),
            }
        }
    }
    Ok(report.is_ok())
}

async fn check_auth(config: &AppConfig) -> Result<bool> {
    let client = ApiClient::from_app_config(config)?;
    match client.tokens().acquire().await {
        Ok(_) => {
            println!("authenticated against {}", config.api_base_url);
            Ok(true)
        }
        Err(e) if e.is_auth() => {
            println!("authentication failed: {e}");
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("contacting {}", config.api_base_url)),
    }
}

async fn status(config: &AppConfig) -> Result<bool> {
    let store = open_store(config).await?;
    let runs = store.latest_sync_runs().await?;

    for collection in Collection::ALL {
        let count = store.count_cached(collection).await?;
        let last = runs.iter().find(|r| r.collection == collection);
        let detail = match last {
            None => "never synced".to_string(),
            Some(run) if run.is_ok() => format!("last sync ok at {}", run.finished_at.to_rfc3339()),
            Some(run) => format!(
                "last sync FAILED at {}: {}",
                run.finished_at.to_rfc3339(),
                run.error.as_deref().unwrap_or("unknown error")
            ),
        };
        println!("{collection:<9} {count:>6} cached  {detail}");
    }

    println!("strategies {:>5} active", store.count_active_strategies().await?);
    Ok(true)
}

async fn strategies(config: &AppConfig, active_only: bool) -> Result<bool> {
    let store = open_store(config).await?;
    let strategies = store.list_strategies().await?;

    for s in strategies.iter().filter(|s| s.active || !active_only) {
        let state = if s.active { "active" } else { "inactive" };
        let criteria = if s.filters.is_empty() { "any listing" } else { "filtered" };
        println!("{:>4}  {:<30}  ${:<6}  {state:<8}  {criteria}", s.id, s.name, s.target_amount);
    }
    Ok(true)
}

async fn run(cli: Cli) -> Result<bool> {
    let config = AppConfig::load().context("loading configuration")?;

    match cli.command {
        Commands::Sync { json } => sync(&config, json).await,
        Commands::CheckAuth => check_auth(&config).await,
        Commands::Status => status(&config).await,
        Commands::Strategies { active } => strategies(&config, active).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
