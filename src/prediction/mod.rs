//! Escalation forecasting over a longer rolling event window
//!
//! The engine keeps its own bounded window, independent of the event cache,
//! fed by every ingested event. From it we derive velocity, acceleration and
//! fine-grained hotspots, then a per-horizon escalation forecast. The whole
//! bundle is cached behind a TTL.

pub mod fine_hotspots;
pub mod forecast;
pub mod trend;

pub use fine_hotspots::{identify_fine_hotspots, FineHotspot};
pub use forecast::{predict_escalation, CrisisPrediction, ForecastInputs, Severity};
pub use trend::{calculate_acceleration, calculate_velocity, Trend};

use crate::events::CrisisEvent;
use crate::geo::round_to;
use crate::state::CacheStats;
use crate::ttl::TtlCache;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Fine hotspots included in a bundle
const BUNDLE_HOTSPOTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetrics {
    pub velocity: f64,
    pub trend: Trend,
    pub acceleration: f64,
    pub hotspot_count: usize,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBundle {
    pub predictions: Vec<CrisisPrediction>,
    pub metrics: PredictionMetrics,
    pub hotspots: Vec<FineHotspot>,
    pub generated_at: DateTime<Utc>,
}

impl PredictionBundle {
    /// Longest horizon forecast in this bundle, in minutes
    pub fn max_horizon(&self) -> Option<u32> {
        self.predictions.iter().map(|p| p.time_horizon).max()
    }
}

pub struct PredictionEngine {
    window: VecDeque<CrisisEvent>,
    capacity: usize,
    cache: TtlCache<PredictionBundle>,
}

impl PredictionEngine {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn add_event(&mut self, event: CrisisEvent) {
        self.window.push_back(event);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Cached bundle if it has not expired at `now`
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<PredictionBundle>> {
        self.cache.fresh(now)
    }

    /// True when the next `predictions` call at `now` would be served from cache
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.fresh(now).is_some()
    }

    /// Forecast bundle, recomputed only once the TTL has lapsed
    pub fn predictions(&mut self, stats: &CacheStats, now: DateTime<Utc>) -> Arc<PredictionBundle> {
        let window = self.window.make_contiguous();
        self.cache.get_or_refresh(now, || {
            let bundle = compute_bundle(window, stats, now);
            log::debug!(
                "Recomputed predictions over {} events: trend={} velocity={:.2}",
                bundle.metrics.data_points,
                bundle.metrics.trend.as_str(),
                bundle.metrics.velocity
            );
            bundle
        })
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}

/// Pure forecast over `events` (arrival order) and the current cache stats
pub fn compute_bundle(events: &[CrisisEvent], stats: &CacheStats, now: DateTime<Utc>) -> PredictionBundle {
    let timestamps: Vec<DateTime<Utc>> = events.iter().map(CrisisEvent::timestamp).collect();

    let (velocity, trend) = calculate_velocity(&timestamps);
    let acceleration = calculate_acceleration(&timestamps);
    let mut hotspots = identify_fine_hotspots(events);

    let predictions = predict_escalation(&ForecastInputs {
        velocity,
        trend,
        acceleration,
        event_count: events.len(),
        hotspots: &hotspots,
        critical_reports: stats.critical_social_reports(),
    });

    let metrics = PredictionMetrics {
        velocity: round_to(velocity, 2),
        trend,
        acceleration: round_to(acceleration, 2),
        hotspot_count: hotspots.len(),
        data_points: events.len(),
    };

    hotspots.truncate(BUNDLE_HOTSPOTS);

    PredictionBundle {
        predictions,
        metrics,
        hotspots,
        generated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Location, RiskLevel, WeatherData, WeatherRiskEvent};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    fn fire_at(ts: DateTime<Utc>) -> CrisisEvent {
        CrisisEvent::Weather(WeatherRiskEvent {
            event_id: "w".to_string(),
            source: "test".to_string(),
            location: Location::new(34.05, -118.25),
            data: WeatherData {
                fire_index: 90.0,
                ..WeatherData::default()
            },
            risk_level: RiskLevel::Critical,
            timestamp: ts,
        })
    }

    #[test]
    fn test_empty_window_is_neutral() {
        let bundle = compute_bundle(&[], &CacheStats::default(), start());
        assert_eq!(bundle.metrics.velocity, 0.0);
        assert_eq!(bundle.metrics.trend, Trend::Stable);
        assert_eq!(bundle.metrics.data_points, 0);
        assert!(bundle.hotspots.is_empty());
        assert_eq!(bundle.predictions.len(), 3);
        assert_eq!(bundle.max_horizon(), Some(120));
    }

    #[test]
    fn test_single_burst_is_stable_with_hotspot() {
        // 40 events in one bucket: no velocity, but one intense fine hotspot
        let events: Vec<_> = (0..40).map(|_| fire_at(start())).collect();
        let bundle = compute_bundle(&events, &CacheStats::default(), start());

        assert_eq!(bundle.metrics.trend, Trend::Stable);
        assert_eq!(bundle.metrics.hotspot_count, 1);
        assert_eq!(bundle.hotspots[0].intensity, 100.0);
        assert_eq!(bundle.predictions[0].crisis_type, "fire");
        // min(100, 40 / 2) * 0.8
        assert_eq!(bundle.predictions[0].confidence, 16.0);
    }

    #[test]
    fn test_surge_escalates_rapidly() {
        let mut events = Vec::new();
        for (bucket, count) in [2, 2, 2, 2, 2, 2, 40].iter().enumerate() {
            for i in 0..*count {
                let ts = start() + ChronoDuration::minutes(5 * bucket as i64) + ChronoDuration::seconds(i);
                events.push(fire_at(ts));
            }
        }

        let bundle = compute_bundle(&events, &CacheStats::default(), start());
        assert_eq!(bundle.metrics.trend, Trend::EscalatingRapidly);
        assert_eq!(bundle.metrics.velocity, 152.0);

        // Newest 50 events run at 152/h; the 2 before them share one bucket (0/h).
        // Acceleration 152 > 10 lifts the base from 85 to 100: 100 * 0.9375 = 93.75
        assert_eq!(bundle.metrics.acceleration, 152.0);
        assert_eq!(bundle.predictions[0].probability, 93.8);
        assert_eq!(bundle.predictions[0].severity, Severity::Critical);
    }

    #[test]
    fn test_rapid_trend_without_acceleration() {
        // 9 events: too few for acceleration, velocity 9/15 per minute = 36/h
        let mut events = vec![fire_at(start())];
        for i in 0..8 {
            events.push(fire_at(start() + ChronoDuration::minutes(5) + ChronoDuration::seconds(i)));
        }

        let bundle = compute_bundle(&events, &CacheStats::default(), start());
        assert_eq!(bundle.metrics.trend, Trend::EscalatingRapidly);
        assert_eq!(bundle.metrics.acceleration, 0.0);

        // 85 * 0.9375 = 79.6875; severity is banded on the unrounded value
        let p30 = &bundle.predictions[0];
        assert_eq!(p30.time_horizon, 30);
        assert_eq!(p30.probability, 79.7);
        assert_eq!(p30.severity, Severity::Critical);
    }

    #[test]
    fn test_window_is_bounded_and_cached() {
        let mut engine = PredictionEngine::new(5, Duration::from_secs(60));
        for _ in 0..8 {
            engine.add_event(fire_at(start()));
        }
        assert_eq!(engine.window_len(), 5);

        let stats = CacheStats::default();
        let first = engine.predictions(&stats, start());
        assert!(engine.is_fresh(start() + ChronoDuration::seconds(30)));

        engine.add_event(fire_at(start()));
        let second = engine.predictions(&stats, start() + ChronoDuration::seconds(30));
        assert!(Arc::ptr_eq(&first, &second));

        let third = engine.predictions(&stats, start() + ChronoDuration::seconds(61));
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
