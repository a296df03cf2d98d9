//! Environment-driven runtime configuration.

use std::env;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Sqlite database holding the partitioned bucket tables.
    pub db_path: String,
    /// JSONL file the sensor gateway appends one-minute samples to.
    pub sample_stream_path: String,
    /// Bound of the ingest sample channel.
    pub channel_buffer: usize,
    /// Per-node timeout for cluster fan-out requests.
    pub node_timeout_secs: u64,
    pub rust_log: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = env::var("LANEFLOW_DB_PATH").unwrap_or_else(|_| "data/laneflow.db".to_string());

        let sample_stream_path = env::var("SAMPLE_STREAM_PATH")
            .map_err(|_| ConfigError::MissingVariable("SAMPLE_STREAM_PATH".to_string()))?;

        let channel_buffer = env::var("PIPELINE_CHANNEL_BUFFER")
            .unwrap_or_else(|_| "10000".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("PIPELINE_CHANNEL_BUFFER must be an integer".to_string())
            })?;
        if channel_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "PIPELINE_CHANNEL_BUFFER must be positive".to_string(),
            ));
        }

        let node_timeout_secs = env::var("CLUSTER_NODE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .unwrap_or(10);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            db_path,
            sample_stream_path,
            channel_buffer,
            node_timeout_secs,
            rust_log,
        })
    }
}
