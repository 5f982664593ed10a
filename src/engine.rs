//! Crisis engine - owns the event cache and every derived view
//!
//! One `CrisisEngine` is constructed at startup and shared between the
//! ingestion loop, the persistence task and whatever reads derived views,
//! through a `SharedEngine` handle.
//!
//! ```text
//! CrisisEvent
//!     ↓
//! CrisisEngine::ingest()
//!     ↓
//! EventCache (bounded, per stream) + PredictionEngine window
//!     ↓
//! hotspots() / predictions() / danger_zones() / metrics()   (TTL cached)
//! ```

use crate::config::CrisisConfig;
use crate::danger_zones::{DangerZoneBundle, DangerZonePredictor};
use crate::events::CrisisEvent;
use crate::hotspots::{HotspotAggregator, HotspotCell};
use crate::metrics::{StreamMetrics, StreamMetricsSnapshot};
use crate::persistence::{CacheSnapshot, HotspotSnapshot};
use crate::prediction::{PredictionBundle, PredictionEngine};
use crate::state::{CacheStats, ClearSummary, EventCache, LatestEvents};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Notify};

/// Engine handle shared across tasks
pub type SharedEngine = Arc<Mutex<CrisisEngine>>;

pub struct CrisisEngine {
    cache: EventCache,
    hotspots: HotspotAggregator,
    predictions: PredictionEngine,
    zones: DangerZonePredictor,
    metrics: StreamMetrics,

    /// Events per stream handed to the danger zone predictor
    analysis_event_limit: usize,

    /// Signalled after `clear` so the persistence task snapshots right away
    flush_signal: Option<Arc<Notify>>,

    /// Clock (replaced in tests)
    now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl CrisisEngine {
    pub fn new(config: &CrisisConfig) -> Self {
        Self::new_with_clock(config, Box::new(Utc::now))
    }

    /// Create an engine reading time from `now_fn`
    ///
    /// Used for testing with deterministic timestamps.
    pub fn new_with_clock(
        config: &CrisisConfig,
        now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        let started_at = now_fn();
        Self {
            cache: EventCache::new(config.event_cache_size),
            hotspots: HotspotAggregator::new(config.hotspot_ttl),
            predictions: PredictionEngine::new(config.prediction_window_size, config.prediction_ttl),
            zones: DangerZonePredictor::new(config.danger_zone_ttl),
            metrics: StreamMetrics::new(started_at),
            analysis_event_limit: config.analysis_event_limit,
            flush_signal: None,
            now_fn,
        }
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    /// Attach the persistence task's flush trigger
    pub fn set_flush_signal(&mut self, signal: Arc<Notify>) {
        self.flush_signal = Some(signal);
    }

    fn now(&self) -> DateTime<Utc> {
        (self.now_fn)()
    }

    /// Append an event to the cache and the prediction window
    pub fn ingest(&mut self, event: CrisisEvent) {
        let now = self.now();
        self.apply(event);
        self.metrics.record_event(now, None);
    }

    /// Like `ingest`, also recording latency since `received`
    pub fn ingest_received_at(&mut self, event: CrisisEvent, received: Instant) {
        let now = self.now();
        self.apply(event);
        let latency_ms = received.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_event(now, Some(latency_ms));
    }

    fn apply(&mut self, event: CrisisEvent) {
        self.predictions.add_event(event.clone());
        self.cache.append(event);
    }

    /// Newest `limit` events per stream
    pub fn latest(&self, limit: usize) -> LatestEvents {
        self.cache.latest(limit, self.now())
    }

    /// Truncate both streams to `keep_fraction` and drop every cached view
    pub fn clear(&mut self, keep_fraction: f64) -> ClearSummary {
        let summary = self.cache.truncate_to_fraction(keep_fraction);
        self.hotspots.invalidate();
        self.predictions.invalidate();
        self.zones.invalidate();

        log::info!(
            "🧹 Cleared event cache: kept {} weather, {} social",
            summary.weather_kept,
            summary.social_kept
        );

        if let Some(signal) = &self.flush_signal {
            signal.notify_one();
        }
        summary
    }

    pub fn hotspots(&mut self) -> Arc<Vec<HotspotCell>> {
        let now = self.now();
        self.hotspots.hotspots(&self.cache, now)
    }

    pub fn predictions(&mut self) -> Arc<PredictionBundle> {
        let now = self.now();
        self.predictions_at(now)
    }

    fn predictions_at(&mut self, now: DateTime<Utc>) -> Arc<PredictionBundle> {
        if let Some(bundle) = self.predictions.fresh(now) {
            return bundle;
        }

        let stats = self.cache.stats();
        let bundle = self.predictions.predictions(&stats, now);
        if let Some(horizon) = bundle.max_horizon() {
            self.metrics.record_prediction(now, horizon, None);
        }
        bundle
    }

    pub fn danger_zones(&mut self) -> Arc<DangerZoneBundle> {
        let now = self.now();
        if let Some(bundle) = self.zones.fresh(now) {
            return bundle;
        }

        let events = self.cache.latest(self.analysis_event_limit, now).combined();
        let hotspots = self.hotspots.hotspots(&self.cache, now);
        let velocity = self.predictions_at(now).metrics.velocity;

        self.zones.danger_zones(&events, &hotspots, velocity, now)
    }

    pub fn metrics(&mut self) -> Arc<StreamMetricsSnapshot> {
        let now = self.now();
        self.metrics.snapshot(now)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Copy of the cache contents and last hotspot result for persistence
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            weather: self.cache.weather().iter().cloned().collect(),
            social: self.cache.social().iter().cloned().collect(),
            hotspots: self
                .hotspots
                .last_computed()
                .map(|(cells, cache_time)| HotspotSnapshot {
                    hotspots: cells.as_ref().clone(),
                    cache_time,
                }),
        }
    }

    /// Seed the cache (and prediction window) from a persisted snapshot
    ///
    /// Streams longer than capacity keep their newest events. The prediction
    /// window receives the restored events in timestamp order.
    pub fn restore(&mut self, snapshot: CacheSnapshot) {
        let CacheSnapshot {
            weather,
            social,
            hotspots,
        } = snapshot;

        let mut window: Vec<CrisisEvent> = weather
            .iter()
            .cloned()
            .map(CrisisEvent::Weather)
            .chain(social.iter().cloned().map(CrisisEvent::Social))
            .collect();
        window.sort_by_key(CrisisEvent::timestamp);
        for event in window {
            self.predictions.add_event(event);
        }

        self.cache.restore(weather, social);

        match hotspots {
            Some(HotspotSnapshot {
                hotspots,
                cache_time,
            }) => self.hotspots.seed(hotspots, cache_time),
            None => self.hotspots.invalidate(),
        }
        self.predictions.invalidate();
        self.zones.invalidate();

        log::info!(
            "♻️  Restored {} weather and {} social events",
            self.cache.weather().len(),
            self.cache.social().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Location, RiskLevel, WeatherData, WeatherRiskEvent};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::atomic::{AtomicI64, Ordering};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    /// Engine with a clock advanced through the returned counter (seconds)
    fn engine_with_clock(config: &CrisisConfig) -> (CrisisEngine, Arc<AtomicI64>) {
        let offset = Arc::new(AtomicI64::new(0));
        let clock = Arc::clone(&offset);
        let engine = CrisisEngine::new_with_clock(
            config,
            Box::new(move || base() + ChronoDuration::seconds(clock.load(Ordering::SeqCst))),
        );
        (engine, offset)
    }

    fn fire(id: usize) -> CrisisEvent {
        CrisisEvent::Weather(WeatherRiskEvent {
            event_id: format!("w{}", id),
            source: "test".to_string(),
            location: Location::new(34.05, -118.24),
            data: WeatherData {
                fire_index: 90.0,
                ..WeatherData::default()
            },
            risk_level: RiskLevel::Critical,
            timestamp: base(),
        })
    }

    #[test]
    fn test_forty_fire_events_single_location() {
        let (mut engine, _) = engine_with_clock(&CrisisConfig::default());
        for i in 0..40 {
            engine.ingest(fire(i));
        }

        let hotspots = engine.hotspots();
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].risk_level, RiskLevel::Critical);
        assert_eq!(hotspots[0].avg_fire_index, 90.0);

        let predictions = engine.predictions();
        assert_eq!(predictions.metrics.trend, crate::prediction::Trend::Stable);
        assert_eq!(predictions.metrics.data_points, 40);

        let zones = engine.danger_zones();
        assert_eq!(zones.total_zones, 1);
        // 40 events -> radius capped at 50 km; events sit ~23 km from the cell center
        assert_eq!(zones.current_zones[0].radius_km, 50.0);
        assert_eq!(zones.evacuation_zones.len(), 1);
    }

    #[test]
    fn test_clear_invalidates_views() {
        let (mut engine, clock) = engine_with_clock(&CrisisConfig::default());
        for i in 0..10 {
            engine.ingest(fire(i));
        }
        let before = engine.hotspots();
        assert_eq!(before[0].event_count, 10);

        clock.store(1, Ordering::SeqCst);
        let summary = engine.clear(0.3);
        assert_eq!(summary.weather_kept, 3);

        // Inside the TTL, but clear dropped the cached result
        let after = engine.hotspots();
        assert_eq!(after[0].event_count, 3);
    }

    #[test]
    fn test_fresh_predictions_reuse_cached_bundle() {
        let (mut engine, clock) = engine_with_clock(&CrisisConfig::default());
        engine.ingest(fire(0));
        let first = engine.predictions();

        clock.store(30, Ordering::SeqCst);
        engine.ingest(fire(1));
        let second = engine.predictions();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.metrics.data_points, 1);

        clock.store(60, Ordering::SeqCst);
        assert_eq!(engine.predictions().metrics.data_points, 2);
    }

    #[tokio::test]
    async fn test_clear_signals_flush() {
        let (mut engine, _) = engine_with_clock(&CrisisConfig::default());
        let signal = Arc::new(Notify::new());
        engine.set_flush_signal(Arc::clone(&signal));

        engine.ingest(fire(0));
        engine.clear(0.0);

        let notified =
            tokio::time::timeout(std::time::Duration::from_secs(1), signal.notified()).await;
        assert!(notified.is_ok(), "clear did not request a flush");
    }

    #[test]
    fn test_predictions_feed_metrics_horizon() {
        let (mut engine, _) = engine_with_clock(&CrisisConfig::default());
        engine.ingest(fire(0));
        engine.predictions();

        let metrics = engine.metrics();
        assert_eq!(metrics.total_events_processed, 1);
        assert_eq!(metrics.predictions_ahead_minutes, 120);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let config = CrisisConfig {
            event_cache_size: 5,
            ..CrisisConfig::default()
        };
        let (mut source, _) = engine_with_clock(&config);
        for i in 0..8 {
            source.ingest(fire(i));
        }
        source.hotspots();
        let snapshot = source.snapshot();
        assert_eq!(snapshot.weather.len(), 5);
        assert!(snapshot.hotspots.is_some());

        let small = CrisisConfig {
            event_cache_size: 3,
            ..CrisisConfig::default()
        };
        let (mut restored, _) = engine_with_clock(&small);
        restored.restore(snapshot);

        let latest = restored.latest(10);
        let ids: Vec<_> = latest.weather.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["w5", "w6", "w7"]);

        // Seeded hotspots are served until they expire
        assert_eq!(restored.hotspots()[0].event_count, 5);
        assert_eq!(restored.predictions().metrics.data_points, 5);
    }
}
