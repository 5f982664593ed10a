//! Crate-wide error types
//!
//! Only configuration and storage can fail. Derived views (hotspots,
//! predictions, danger zones, metrics) resolve degenerate input to neutral
//! values instead of returning errors.

use crate::config::ConfigError;

pub type CrisisResult<T> = Result<T, CrisisError>;

#[derive(Debug, thiserror::Error)]
pub enum CrisisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ingestion channel closed")]
    ChannelClosed,
}
