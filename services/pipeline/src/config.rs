//! Pipeline configuration
//!
//! One immutable snapshot, loaded once from an optional TOML file plus
//! `T2T__`-prefixed environment overrides, validated, then cloned into every
//! stage at start.

use bus::{Encoding, EventBusConfig};
use common::{RegistryError, StaticRegistry};
use decision::{DecisionConfig, DecisionConfigError};
use execution_router::{PaperVenueConfig, RouterConfig, RouterConfigError};
use features::FeatureConfig;
use risk_manager::{LimitsError, RiskLimits};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "T2T";

/// Separator between prefix and nested keys, e.g. `T2T__RISK__WINDOW_MS`
pub const ENV_SEPARATOR: &str = "__";

/// The only transport this build ships
pub const LOCAL_TRANSPORT: &str = "local";

/// Configuration errors; all fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File or environment could not be read or deserialized
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Transport other than the in-process bus
    #[error("unsupported transport {0:?}, only \"local\" is available")]
    UnsupportedTransport(String),

    /// Wire encoding name not recognized
    #[error("unsupported encoding {0:?}")]
    UnsupportedEncoding(String),

    /// Sharded topics need at least one shard
    #[error("bus.shards must be at least 1")]
    ZeroShards,

    /// Channels need room for at least one message
    #[error("bus.capacity must be at least 1")]
    ZeroCapacity,

    /// Feature window of zero length
    #[error("features.window_ms must be positive")]
    EmptyWindow,

    /// Symbol table is inconsistent
    #[error(transparent)]
    Symbols(#[from] RegistryError),

    /// Decision layers or thresholds invalid
    #[error(transparent)]
    Decision(#[from] DecisionConfigError),

    /// Risk limits invalid
    #[error(transparent)]
    Risk(#[from] LimitsError),

    /// Routing table or venue settings invalid
    #[error(transparent)]
    Router(#[from] RouterConfigError),
}

/// Message fabric settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusSettings {
    /// Transport name; only `local` is supported
    pub transport: String,
    /// Ring capacity per channel
    pub capacity: usize,
    /// Shards for `ticks` and `book`, one book stage per shard
    pub shards: u32,
    /// Wire encoding for serialized payloads
    pub encoding: String,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            transport: LOCAL_TRANSPORT.to_string(),
            capacity: 4096,
            shards: 1,
            encoding: "json".to_string(),
        }
    }
}

impl BusSettings {
    /// Settings for the in-process bus
    #[must_use]
    pub const fn event_bus(&self) -> EventBusConfig {
        EventBusConfig {
            capacity: self.capacity,
            shards: self.shards,
        }
    }

    /// Parsed wire encoding
    pub fn encoding(&self) -> Result<Encoding, ConfigError> {
        self.encoding
            .parse()
            .map_err(|_| ConfigError::UnsupportedEncoding(self.encoding.clone()))
    }
}

/// One registered symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymbolEntry {
    /// Venue symbol name
    pub name: String,
    /// Internal id carried in every message
    pub id: u32,
}

/// Logging and metrics reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySettings {
    /// Filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Emit JSON log lines
    pub json: bool,
    /// Seconds between metrics log lines, 0 disables them
    pub metrics_interval_secs: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_filter: "info,bus=warn".to_string(),
            json: false,
            metrics_interval_secs: 10,
        }
    }
}

/// Whole-pipeline configuration snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Message fabric
    pub bus: BusSettings,
    /// Symbol registry
    pub symbols: Vec<SymbolEntry>,
    /// Feature stage
    pub features: FeatureConfig,
    /// Decision stage
    pub decision: DecisionConfig,
    /// Risk stage
    pub risk: RiskLimits,
    /// Router stage
    pub router: RouterConfig,
    /// Paper venue adapters, one per routed venue
    pub paper_venue: PaperVenueConfig,
    /// Logging and metrics
    pub telemetry: TelemetrySettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bus: BusSettings::default(),
            symbols: vec![
                SymbolEntry {
                    name: "BTCUSDT".to_string(),
                    id: 1,
                },
                SymbolEntry {
                    name: "ETHUSDT".to_string(),
                    id: 2,
                },
            ],
            features: FeatureConfig::default(),
            decision: DecisionConfig::default(),
            risk: RiskLimits::default(),
            router: RouterConfig::default(),
            paper_venue: PaperVenueConfig::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from `path` (if any) and the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Registry built from the symbol table
    pub fn registry(&self) -> Result<StaticRegistry, ConfigError> {
        Ok(StaticRegistry::from_pairs(
            self.symbols.iter().map(|s| (s.name.clone(), s.id)),
        )?)
    }

    /// Check every section; the first problem wins
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.transport != LOCAL_TRANSPORT {
            return Err(ConfigError::UnsupportedTransport(self.bus.transport.clone()));
        }
        self.bus.encoding()?;
        if self.bus.shards == 0 {
            return Err(ConfigError::ZeroShards);
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.features.window_ms == 0 {
            return Err(ConfigError::EmptyWindow);
        }

        let registry = self.registry()?;
        self.decision.validate()?;
        self.risk.validate()?;
        self.router.validate(&registry)?;
        self.paper_venue.validate()?;
        Ok(())
    }
}
