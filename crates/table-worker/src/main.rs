//! Table Worker - runs dealer tables for the poker web application.
//!
//! `serve` wires the production collaborators and works through jobs until
//! interrupted. `enqueue` submits a single job to a running worker.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use table_core::{Job, JobClient, JobServer, Settings, TableManager};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "table-worker")]
#[command(about = "Runs ACPC dealer tables on behalf of the web application")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept jobs and run matches until Ctrl-C
    Serve {
        /// Settings file (JSON); defaults are used when it does not exist
        #[arg(short, long, default_value = "settings.json")]
        settings: PathBuf,

        /// Address to accept jobs on, overriding the settings file
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Number of job workers, overriding the settings file
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Submit one job to a running worker
    Enqueue {
        #[arg(long, default_value = "127.0.0.1:7400")]
        addr: SocketAddr,

        /// Request code, e.g. "start" or "play"
        #[arg(long)]
        request: String,

        #[arg(long)]
        match_id: String,

        /// Job parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match args.command {
        Command::Serve {
            settings,
            listen,
            workers,
        } => serve(settings, listen, workers).await,
        Command::Enqueue {
            addr,
            request,
            match_id,
            params,
        } => enqueue(addr, request, match_id, params).await,
    }
}

async fn serve(
    settings_path: PathBuf,
    listen: Option<SocketAddr>,
    workers: Option<usize>,
) -> Result<()> {
    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;
    if let Some(addr) = listen {
        settings.intake_addr = addr;
    }
    if let Some(workers) = workers {
        settings.workers = workers;
    }

    info!("Starting table worker");
    info!("Dealer program: {}", settings.dealer_program.display());
    info!("Match store: {}", settings.match_store_directory.display());

    let addr = settings.intake_addr;
    let workers = settings.workers;
    let manager = Arc::new(TableManager::builder(settings).build()?);
    let handle = JobServer::start(addr, manager, workers).await?;

    info!("Accepting jobs on {}", handle.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, draining queued jobs");
    handle.join().await;

    Ok(())
}

async fn enqueue(
    addr: SocketAddr,
    request: String,
    match_id: String,
    params: Option<String>,
) -> Result<()> {
    let params = match params {
        None => Map::new(),
        Some(text) => match serde_json::from_str(&text).context("parsing --params")? {
            Value::Object(map) => map,
            other => bail!("--params must be a JSON object, got {}", other),
        },
    };

    let mut job = Job::new(request, match_id);
    job.params = params;

    let mut client = JobClient::connect(addr).await?;
    client.submit(&job).await?;
    info!(request = %job.request, match_id = %job.match_id, "Job queued on {}", addr);

    Ok(())
}
