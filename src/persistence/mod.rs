//! Durable snapshots of the event cache
//!
//! A snapshot is three named records: one JSON array per stream and the
//! last computed hotspot list with its cache timestamp. Backends only store
//! opaque named payloads; encoding lives here so both backends produce
//! identical records.

pub mod json_store;
pub mod sqlite_store;
pub mod task;

pub use json_store::JsonFileStore;
pub use sqlite_store::SqliteSnapshotStore;
pub use task::{spawn_persistence_task, PersistenceHandle};

use crate::config::{BackendType, CrisisConfig};
use crate::error::CrisisResult;
use crate::events::{SocialSignalEvent, WeatherRiskEvent};
use crate::hotspots::HotspotCell;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const WEATHER_RECORD: &str = "weather_events";
pub const SOCIAL_RECORD: &str = "social_events";
pub const HOTSPOT_RECORD: &str = "hotspots";

#[async_trait]
pub trait SnapshotBackend: Send {
    /// Replace the record called `name` with `payload`
    async fn write_record(&mut self, name: &str, payload: &str) -> CrisisResult<()>;

    /// Stored payload for `name`, or `None` if it was never written
    async fn read_record(&mut self, name: &str) -> CrisisResult<Option<String>>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotSnapshot {
    pub hotspots: Vec<HotspotCell>,
    pub cache_time: DateTime<Utc>,
}

/// Everything persisted for one engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub weather: Vec<WeatherRiskEvent>,
    pub social: Vec<SocialSignalEvent>,
    pub hotspots: Option<HotspotSnapshot>,
}

/// Open the backend selected by `config.snapshot_backend`
pub fn open_backend(config: &CrisisConfig) -> CrisisResult<Box<dyn SnapshotBackend>> {
    let backend: Box<dyn SnapshotBackend> = match config.snapshot_backend {
        BackendType::Json => Box::new(JsonFileStore::new(&config.snapshot_dir)?),
        BackendType::Sqlite => Box::new(SqliteSnapshotStore::new(&config.snapshot_db_path)?),
    };
    log::info!("💾 Snapshot backend: {}", backend.backend_type());
    Ok(backend)
}

/// Write every record of `snapshot`
///
/// The hotspot record is left untouched when no hotspots have been computed.
pub async fn save_snapshot(
    backend: &mut dyn SnapshotBackend,
    snapshot: &CacheSnapshot,
) -> CrisisResult<()> {
    backend
        .write_record(WEATHER_RECORD, &serde_json::to_string_pretty(&snapshot.weather)?)
        .await?;
    backend
        .write_record(SOCIAL_RECORD, &serde_json::to_string_pretty(&snapshot.social)?)
        .await?;

    if let Some(hotspots) = &snapshot.hotspots {
        backend
            .write_record(HOTSPOT_RECORD, &serde_json::to_string_pretty(hotspots)?)
            .await?;
    }

    log::debug!(
        "Saved snapshot: {} weather, {} social events ({})",
        snapshot.weather.len(),
        snapshot.social.len(),
        backend.backend_type()
    );
    Ok(())
}

/// Read every record back; a missing or unreadable record restores as empty
pub async fn load_snapshot(backend: &mut dyn SnapshotBackend) -> CacheSnapshot {
    let snapshot = CacheSnapshot {
        weather: load_record(backend, WEATHER_RECORD).await.unwrap_or_default(),
        social: load_record(backend, SOCIAL_RECORD).await.unwrap_or_default(),
        hotspots: load_record(backend, HOTSPOT_RECORD).await,
    };

    log::info!(
        "Loaded snapshot: {} weather, {} social events, hotspots {}",
        snapshot.weather.len(),
        snapshot.social.len(),
        if snapshot.hotspots.is_some() { "present" } else { "absent" }
    );
    snapshot
}

async fn load_record<T: DeserializeOwned>(backend: &mut dyn SnapshotBackend, name: &str) -> Option<T> {
    let payload = match backend.read_record(name).await {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            log::info!("No existing snapshot record: {}", name);
            return None;
        }
        Err(e) => {
            log::warn!("⚠️  Failed to read snapshot record {}: {}", name, e);
            return None;
        }
    };

    match serde_json::from_str(&payload) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("⚠️  Ignoring corrupt snapshot record {}: {}", name, e);
            None
        }
    }
}
