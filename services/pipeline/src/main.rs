//! Tick-to-trade pipeline binary
//!
//! - `run`: start every stage and wait for Ctrl-C or SIGTERM
//! - `replay <file>`: feed a JSON-lines tick file, drain, print metrics
//! - `check-config`: load and validate configuration only

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{ManualClock, SystemClock, Ts};
use pipeline::{Pipeline, PipelineConfig, replay};
use services_common::init_tracing;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{info, warn};

/// Silence that counts as "drained" after a replay
const DRAIN_QUIET: Duration = Duration::from_millis(200);

/// Upper bound on waiting for a replay to drain
const DRAIN_LIMIT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "tick-to-trade")]
#[command(about = "Tick-to-trade pipeline: book, features, decision, risk, routing")]
#[command(version)]
struct Cli {
    /// TOML configuration file; `T2T__SECTION__KEY` variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start all stages on live wall-clock time
    Run,
    /// Replay a JSON-lines file of ticks and signals
    Replay {
        /// Input file, one encoded message per line
        file: PathBuf,
    },
    /// Validate configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref()).context("invalid configuration")?;
    init_tracing(&config.telemetry.log_filter, cli.json_logs || config.telemetry.json)?;

    match cli.command {
        Commands::Run => run(&config).await,
        Commands::Replay { file } => replay_file(&config, &file).await,
        Commands::CheckConfig => {
            info!(
                shards = config.bus.shards,
                symbols = config.symbols.len(),
                venues = config.router.venues.len(),
                layers = ?config.decision.enabled_layers,
                "configuration ok"
            );
            Ok(())
        }
    }
}

async fn run(config: &PipelineConfig) -> Result<()> {
    info!("Starting tick-to-trade pipeline v{}", env!("CARGO_PKG_VERSION"));
    let pipeline = Pipeline::start(config, Arc::new(SystemClock))?;
    let reporter = (config.telemetry.metrics_interval_secs > 0)
        .then(|| pipeline.spawn_metrics_reporter(Duration::from_secs(config.telemetry.metrics_interval_secs)));

    shutdown_signal().await;
    info!("Shutdown signal received, stopping stages");

    pipeline.log_metrics();
    let result = pipeline.shutdown().await;
    if let Some(reporter) = reporter {
        if let Err(e) = reporter.await {
            warn!(error = %e, "metrics reporter ended abnormally");
        }
    }
    result
}

async fn replay_file(config: &PipelineConfig, file: &Path) -> Result<()> {
    let clock = ManualClock::new(Ts::from_nanos(0));
    let pipeline = Pipeline::start(config, Arc::new(clock.clone()))?;

    let input = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("opening {}", file.display()))?;
    let stats = replay(BufReader::new(input), pipeline.bus(), &clock).await?;
    info!(
        lines = stats.lines,
        published = stats.published,
        skipped = stats.skipped,
        invalid = stats.invalid,
        "replay input exhausted"
    );

    if !pipeline.wait_idle(DRAIN_QUIET, DRAIN_LIMIT).await {
        warn!(limit_secs = DRAIN_LIMIT.as_secs(), "pipeline still busy, stopping anyway");
    }
    let summary = pipeline.summary();
    pipeline.shutdown().await?;

    let report = serde_json::json!({ "replay": stats, "pipeline": summary });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
