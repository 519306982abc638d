//! Daemon configuration with TOML file support.

use agora_api::ApiConfig;
use agora_governance::{VotePolicy, WeightPolicy};
use agora_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How signed ballots are weighted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightingMode {
    /// One ballot, one vote.
    Unweighted,
    /// `floor(balance / weight_unit)` read from the chain API at vote time.
    Balance,
}

/// Configuration for the Agora daemon.
///
/// Loaded from a TOML file (every field optional) and then overridden by
/// command-line flags and environment variables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP port; the realtime channel shares it at `/ws`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of the LMDB environment.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// LMDB map size in MiB.
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,

    /// Base URL of the chain API. Without it balance lookups answer 503.
    #[serde(default)]
    pub chain_api_url: Option<String>,

    #[serde(default = "default_chain_timeout_secs")]
    pub chain_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Accept ballots that carry no wallet signature.
    #[serde(default = "default_true")]
    pub allow_anonymous_votes: bool,

    #[serde(default = "default_weighting")]
    pub weighting: WeightingMode,

    /// Balance per unit of vote weight under `balance` weighting.
    #[serde(default = "default_weight_unit")]
    pub weight_unit: u64,

    /// Events buffered per realtime client before the oldest are dropped.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Log level filter, e.g. `"info"` or `"debug,agora_api=trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Serve Prometheus metrics at `/metrics`.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./agora_data")
}

fn default_map_size_mb() -> usize {
    1024
}

fn default_chain_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_weighting() -> WeightingMode {
    WeightingMode::Unweighted
}

fn default_weight_unit() -> u64 {
    1
}

fn default_broadcast_capacity() -> usize {
    256
}

fn default_log_format() -> LogFormat {
    LogFormat::Human
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl DaemonConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weighting == WeightingMode::Balance {
            if self.chain_api_url.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Invalid(
                    "balance weighting requires chain_api_url".into(),
                ));
            }
            if self.weight_unit == 0 {
                return Err(ConfigError::Invalid("weight_unit must be at least 1".into()));
            }
        }
        if self.map_size_mb == 0 {
            return Err(ConfigError::Invalid("map_size_mb must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 || self.chain_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".into()));
        }
        Ok(())
    }

    pub fn vote_policy(&self) -> VotePolicy {
        VotePolicy {
            allow_anonymous: self.allow_anonymous_votes,
            weighting: match self.weighting {
                WeightingMode::Unweighted => WeightPolicy::Unweighted,
                WeightingMode::Balance => WeightPolicy::Balance {
                    unit: self.weight_unit,
                },
            },
        }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            metrics_enabled: self.enable_metrics,
        }
    }

    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn chain_timeout(&self) -> Duration {
        Duration::from_secs(self.chain_timeout_secs)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            store_path: default_store_path(),
            map_size_mb: default_map_size_mb(),
            chain_api_url: None,
            chain_timeout_secs: default_chain_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            allow_anonymous_votes: true,
            weighting: default_weighting(),
            weight_unit: default_weight_unit(),
            broadcast_capacity: default_broadcast_capacity(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: true,
        }
    }
}

/// Values given on the command line or in the environment. Each one that is
/// set replaces the file value.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub store_path: Option<PathBuf>,
    pub map_size_mb: Option<usize>,
    pub chain_api_url: Option<String>,
    pub chain_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub allow_anonymous_votes: Option<bool>,
    pub weighting: Option<WeightingMode>,
    pub weight_unit: Option<u64>,
    pub broadcast_capacity: Option<usize>,
    pub log_format: Option<LogFormat>,
    pub log_level: Option<String>,
    pub enable_metrics: Option<bool>,
}

impl Overrides {
    pub fn apply(self, base: DaemonConfig) -> DaemonConfig {
        DaemonConfig {
            bind_address: self.bind_address.unwrap_or(base.bind_address),
            port: self.port.unwrap_or(base.port),
            store_path: self.store_path.unwrap_or(base.store_path),
            map_size_mb: self.map_size_mb.unwrap_or(base.map_size_mb),
            chain_api_url: self.chain_api_url.or(base.chain_api_url),
            chain_timeout_secs: self.chain_timeout_secs.unwrap_or(base.chain_timeout_secs),
            request_timeout_secs: self
                .request_timeout_secs
                .unwrap_or(base.request_timeout_secs),
            allow_anonymous_votes: self
                .allow_anonymous_votes
                .unwrap_or(base.allow_anonymous_votes),
            weighting: self.weighting.unwrap_or(base.weighting),
            weight_unit: self.weight_unit.unwrap_or(base.weight_unit),
            broadcast_capacity: self.broadcast_capacity.unwrap_or(base.broadcast_capacity),
            log_format: self.log_format.unwrap_or(base.log_format),
            log_level: self.log_level.unwrap_or(base.log_level),
            enable_metrics: self.enable_metrics.unwrap_or(base.enable_metrics),
        }
    }
}
