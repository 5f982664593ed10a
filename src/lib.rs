//! crisisflow - real-time disaster signal cache and forecasting
//!
//! Weather-risk telemetry and social-media reports flow into a bounded
//! per-stream event cache. Derived views (coarse hotspots, escalation
//! forecasts, danger zones, stream metrics) are computed lazily on read and
//! held behind short TTLs. The cache is snapshotted to JSON files or SQLite
//! on a fixed period and restored at startup.

pub mod config;
pub mod danger_zones;
pub mod engine;
pub mod error;
pub mod events;
pub mod geo;
pub mod hotspots;
pub mod ingestion;
pub mod metrics;
pub mod persistence;
pub mod prediction;
pub mod risk_index;
pub mod state;
pub mod ttl;

pub use config::{BackendType, ConfigError, CrisisConfig};
pub use engine::{CrisisEngine, SharedEngine};
pub use error::{CrisisError, CrisisResult};
pub use events::{CrisisEvent, SocialSignalEvent, StreamEnvelope, StreamKind, WeatherRiskEvent};
