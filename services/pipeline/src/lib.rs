//! Tick-to-trade pipeline wiring
//!
//! Builds the bus from a [`PipelineConfig`] snapshot, subscribes every stage
//! to its inputs and spawns one tokio task per stage instance:
//!
//! ```text
//! ticks.<n> -> book.<n> -> features -> decision -> risk -> router -> routed.<venue> -> execution.<venue>
//!                            ^ signals    ^ fills                                         -> acks, fills, rejects
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod replay;

pub use config::{BusSettings, ConfigError, PipelineConfig, SymbolEntry, TelemetrySettings};
pub use replay::{ReplayStats, replay};

use anyhow::{Context as _, Result, bail};
use bus::{Address, BusMetricsSnapshot, EventBus, Message, Topic};
use common::Clock;
use decision::DecisionStage;
use execution_router::{ExecutionStage, PaperVenue, RouterStage, SmartRouter};
use features::FeatureStage;
use lob::BookStage;
use risk_manager::RiskStage;
use serde::Serialize;
use services_common::{RunFlag, Stage, StageError, StageMetrics, StageMetricsSnapshot, StageRunner, run_flag};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A spawned stage task
struct StageTask {
    name: String,
    handle: JoinHandle<Result<(), StageError>>,
}

/// Serializable view of every stage and the bus
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    /// Per-stage counters and latencies
    pub stages: Vec<StageMetricsSnapshot>,
    /// Per-address bus counters
    pub bus: BusMetricsSnapshot,
}

/// Running pipeline
pub struct Pipeline {
    bus: Arc<EventBus<Message>>,
    stop: watch::Sender<bool>,
    running: RunFlag,
    tasks: Vec<StageTask>,
    metrics: Vec<Arc<StageMetrics>>,
}

impl Pipeline {
    /// Spawn every stage described by `config`
    ///
    /// Must be called inside a tokio runtime. Every subscription exists when
    /// this returns, so messages published afterwards reach their stage.
    pub fn start(config: &PipelineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let registry = config.registry()?;
        let bus = Arc::new(EventBus::new(config.bus.event_bus()));
        let (stop, running) = run_flag();
        let mut pipeline = Self {
            bus,
            stop,
            running,
            tasks: Vec::new(),
            metrics: Vec::new(),
        };

        let shards = config.bus.shards;
        for shard in 0..shards {
            pipeline.spawn(BookStage::new(shard, shards), &[Address::shard(Topic::Ticks, shard)])?;
        }

        let mut feature_inputs: Vec<Address> = (0..shards).map(|s| Address::shard(Topic::Book, s)).collect();
        feature_inputs.push(Address::topic(Topic::Signals));
        pipeline.spawn(FeatureStage::new(config.features.clone()), &feature_inputs)?;

        pipeline.spawn(
            DecisionStage::new(config.decision.clone()),
            &[Address::topic(Topic::Features), Address::topic(Topic::Fills)],
        )?;
        pipeline.spawn(RiskStage::new(config.risk.clone()), &[Address::topic(Topic::Orders)])?;

        let router = SmartRouter::new(&config.router, &registry, Arc::clone(&clock))?;
        pipeline.spawn(RouterStage::new(router), &[Address::topic(Topic::Approved)])?;

        let timeout = Duration::from_millis(config.paper_venue.submit_timeout_ms);
        for &venue in &config.router.venues {
            let adapter = Arc::new(PaperVenue::new(venue, &config.paper_venue, Arc::clone(&clock)));
            let stage = ExecutionStage::new(
                adapter,
                Arc::clone(&clock),
                Arc::clone(&pipeline.bus),
                pipeline.running.clone(),
                timeout,
            )?;
            pipeline.metrics.push(stage.metrics());
            pipeline.tasks.push(StageTask {
                name: format!("execution.{venue}"),
                handle: tokio::spawn(stage.run()),
            });
        }

        info!(
            stages = pipeline.tasks.len(),
            shards,
            venues = config.router.venues.len(),
            "pipeline started"
        );
        Ok(pipeline)
    }

    fn spawn<S: Stage>(&mut self, stage: S, inputs: &[Address]) -> Result<()> {
        let name = stage.name().to_string();
        let runner = StageRunner::new(stage, Arc::clone(&self.bus), inputs, self.running.clone())
            .with_context(|| format!("subscribing {name}"))?;
        self.metrics.push(runner.metrics());
        self.tasks.push(StageTask {
            name,
            handle: tokio::spawn(async move { runner.run().await.map(|_| ()) }),
        });
        Ok(())
    }

    /// Shared bus, for feeding ticks and observing outputs
    #[must_use]
    pub const fn bus(&self) -> &Arc<EventBus<Message>> {
        &self.bus
    }

    /// Metrics handles, one per stage instance
    #[must_use]
    pub fn metrics(&self) -> &[Arc<StageMetrics>] {
        &self.metrics
    }

    /// Metrics for the stage labelled `name`
    #[must_use]
    pub fn stage_metrics(&self, name: &str) -> Option<&Arc<StageMetrics>> {
        self.metrics.iter().find(|m| m.stage() == name)
    }

    /// Current counters of every stage and the bus
    #[must_use]
    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            stages: self.metrics.iter().map(|m| m.snapshot()).collect(),
            bus: self.bus.metrics().snapshot(),
        }
    }

    /// Log one line per stage
    pub fn log_metrics(&self) {
        for metrics in &self.metrics {
            log_stage(&metrics.snapshot());
        }
    }

    /// Log stage metrics every `period` until the pipeline stops
    pub fn spawn_metrics_reporter(&self, period: Duration) -> JoinHandle<()> {
        let metrics = self.metrics.clone();
        let mut running = self.running.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for stage in &metrics {
                            log_stage(&stage.snapshot());
                        }
                    }
                    changed = running.changed() => {
                        if changed.is_err() || !*running.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    fn activity(&self) -> u64 {
        self.metrics.iter().map(|m| m.received()).sum()
    }

    /// Wait until no stage has received anything for `quiet`
    ///
    /// Returns `false` if the pipeline was still busy after `limit`.
    pub async fn wait_idle(&self, quiet: Duration, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        let mut last = self.activity();
        loop {
            tokio::time::sleep(quiet).await;
            let current = self.activity();
            if current == last {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            last = current;
        }
    }

    /// Stop every stage and wait for its task
    ///
    /// Fails with the first stage that ended in a fatal error or panicked.
    pub async fn shutdown(self) -> Result<()> {
        // Receivers are held by the stages; a send error means they are all gone
        let _ = self.stop.send(false);

        let mut failed = Vec::new();
        for task in self.tasks {
            match task.handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(stage = %task.name, error = %e, "stage failed");
                    failed.push(format!("{}: {e}", task.name));
                }
                Err(e) => {
                    error!(stage = %task.name, error = %e, "stage task panicked");
                    failed.push(format!("{}: {e}", task.name));
                }
            }
        }
        self.bus.shutdown();
        info!("pipeline stopped");

        if !failed.is_empty() {
            bail!("stages failed: {}", failed.join("; "));
        }
        Ok(())
    }
}

fn log_stage(snapshot: &StageMetricsSnapshot) {
    info!(
        stage = %snapshot.stage,
        received = snapshot.received,
        emitted = snapshot.emitted,
        dropped = snapshot.dropped,
        lagged = snapshot.lagged,
        transient = snapshot.transient_errors,
        p50_ns = snapshot.processing.map_or(0, |l| l.p50),
        p99_ns = snapshot.processing.map_or(0, |l| l.p99),
        e2e_p99_ns = snapshot.end_to_end.map_or(0, |l| l.p99),
        counters = ?snapshot.counters,
        "stage metrics"
    );
}
