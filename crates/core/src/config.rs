use crate::error::{EngineError, EngineResult};
use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `LINEITEM_KV__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Tunables of the pacing engine.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Width of a pacing slot in minutes.
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
    /// Largest impression batch accepted in a single report.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_slot_minutes() -> u32 {
    15
}
fn default_max_batch_size() -> usize {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slot_minutes: default_slot_minutes(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Slots must tile an hour exactly so slot numbers line up across days.
    pub fn validate(&self) -> EngineResult<()> {
        if self.slot_minutes == 0 || self.slot_minutes > 60 || 60 % self.slot_minutes != 0 {
            return Err(EngineError::Config(format!(
                "engine.slot_minutes must divide 60, got {}",
                self.slot_minutes
            )));
        }
        if self.max_batch_size == 0 {
            return Err(EngineError::Config(
                "engine.max_batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("LINEITEM_KV")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
