//! Runtime configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendType {
    Json,
    Sqlite,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Configuration for the crisisflow runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CrisisConfig {
    /// Per-stream capacity of the event cache
    pub event_cache_size: usize,

    /// Capacity of the prediction engine's trend window
    pub prediction_window_size: usize,

    /// Number of most recent events per stream fed to danger-zone analysis
    pub analysis_event_limit: usize,

    /// Where snapshots are written
    pub snapshot_backend: BackendType,
    pub snapshot_dir: PathBuf,
    pub snapshot_db_path: PathBuf,
    pub snapshot_interval: Duration,

    pub hotspot_ttl: Duration,
    pub prediction_ttl: Duration,
    pub danger_zone_ttl: Duration,

    /// Bounded ingestion channel size (events)
    pub channel_buffer: usize,

    /// Ingestion summary log interval in milliseconds
    pub summary_interval_ms: u64,
}

impl Default for CrisisConfig {
    fn default() -> Self {
        Self {
            event_cache_size: 500,
            prediction_window_size: 1000,
            analysis_event_limit: 200,
            snapshot_backend: BackendType::Json,
            snapshot_dir: PathBuf::from("data"),
            snapshot_db_path: PathBuf::from("data/crisisflow.db"),
            snapshot_interval: Duration::from_secs(30),
            hotspot_ttl: Duration::from_secs(60),
            prediction_ttl: Duration::from_secs(60),
            danger_zone_ttl: Duration::from_secs(30),
            channel_buffer: 1000,
            summary_interval_ms: 10_000,
        }
    }
}

impl CrisisConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `EVENT_CACHE_SIZE` (default: 500)
    /// - `PREDICTION_WINDOW_SIZE` (default: 1000)
    /// - `ANALYSIS_EVENT_LIMIT` (default: 200)
    /// - `SNAPSHOT_BACKEND` (default: json, or sqlite)
    /// - `SNAPSHOT_DIR` (default: data)
    /// - `SNAPSHOT_DB_PATH` (default: data/crisisflow.db)
    /// - `SNAPSHOT_INTERVAL_SECS` (default: 30)
    /// - `HOTSPOT_TTL_SECS` / `PREDICTION_TTL_SECS` (default: 60)
    /// - `DANGER_ZONE_TTL_SECS` (default: 30)
    /// - `INGEST_CHANNEL_BUFFER` (default: 1000)
    /// - `SUMMARY_INTERVAL_MS` (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let snapshot_backend = match env::var("SNAPSHOT_BACKEND")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => BackendType::Json,
            "sqlite" => BackendType::Sqlite,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "SNAPSHOT_BACKEND must be 'json' or 'sqlite', got '{}'",
                    other
                )))
            }
        };

        let config = Self {
            event_cache_size: parse_var("EVENT_CACHE_SIZE", defaults.event_cache_size),
            prediction_window_size: parse_var(
                "PREDICTION_WINDOW_SIZE",
                defaults.prediction_window_size,
            ),
            analysis_event_limit: parse_var("ANALYSIS_EVENT_LIMIT", defaults.analysis_event_limit),
            snapshot_backend,
            snapshot_dir: env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
            snapshot_db_path: env::var("SNAPSHOT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_db_path),
            snapshot_interval: Duration::from_secs(parse_var("SNAPSHOT_INTERVAL_SECS", 30)),
            hotspot_ttl: Duration::from_secs(parse_var("HOTSPOT_TTL_SECS", 60)),
            prediction_ttl: Duration::from_secs(parse_var("PREDICTION_TTL_SECS", 60)),
            danger_zone_ttl: Duration::from_secs(parse_var("DANGER_ZONE_TTL_SECS", 30)),
            channel_buffer: parse_var("INGEST_CHANNEL_BUFFER", defaults.channel_buffer),
            summary_interval_ms: parse_var("SUMMARY_INTERVAL_MS", defaults.summary_interval_ms),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_cache_size == 0 {
            return Err(ConfigError::InvalidValue(
                "EVENT_CACHE_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.prediction_window_size == 0 {
            return Err(ConfigError::InvalidValue(
                "PREDICTION_WINDOW_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.channel_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "INGEST_CHANNEL_BUFFER must be greater than 0".to_string(),
            ));
        }

        if self.snapshot_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "SNAPSHOT_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
