//! Danger zones, their projected spread and evacuation recommendations
//!
//! Zones are seeded from the top coarse hotspots. Each zone's intensity is
//! the distance-weighted mean severity of the events inside its radius, so
//! an event at the center counts fully and one on the rim not at all.

use crate::events::CrisisEvent;
use crate::geo::{haversine_km, round_to};
use crate::hotspots::HotspotCell;
use crate::prediction::forecast::{HORIZONS_MINUTES, MULTI_HAZARD};
use crate::ttl::TtlCache;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

/// Hotspots turned into zones per computation
const MAX_ZONES: usize = 5;
/// Zones that get spread projections
const SPREAD_ZONES: usize = 3;

const BASE_RADIUS_KM: f64 = 5.0;
const RADIUS_KM_PER_EVENT: f64 = 2.0;
const MAX_RADIUS_KM: f64 = 50.0;

const MAX_SPREAD_KM_PER_HOUR: f64 = 10.0;
const EVACUATION_RADIUS_FACTOR: f64 = 1.5;
/// Assumed people per square kilometre inside an evacuation zone
const POPULATION_DENSITY_PER_KM2: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Moderate,
    High,
    Severe,
    Critical,
}

impl ThreatLevel {
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity > 75.0 {
            ThreatLevel::Critical
        } else if intensity > 50.0 {
            ThreatLevel::Severe
        } else if intensity > 30.0 {
            ThreatLevel::High
        } else if intensity > 15.0 {
            ThreatLevel::Moderate
        } else {
            ThreatLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "low",
            ThreatLevel::Moderate => "moderate",
            ThreatLevel::High => "high",
            ThreatLevel::Severe => "severe",
            ThreatLevel::Critical => "critical",
        }
    }

    pub fn requires_evacuation(&self) -> bool {
        matches!(self, ThreatLevel::Severe | ThreatLevel::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvacuationPriority {
    Immediate,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DangerZone {
    pub zone_id: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_km: f64,
    pub intensity: f64,
    pub threat_level: ThreatLevel,
    pub event_count: usize,
    pub primary_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadingPrediction {
    pub zone_id: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub current_radius_km: f64,
    pub predicted_radius_km: f64,
    pub spread_rate_km_per_hour: f64,
    pub time_horizon_minutes: u32,
    pub intensity: f64,
    pub threat_level: ThreatLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvacuationZone {
    pub zone_id: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub evacuation_radius_km: f64,
    pub danger_radius_km: f64,
    pub estimated_population: u64,
    pub threat_level: ThreatLevel,
    pub primary_threat: String,
    pub priority: EvacuationPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DangerZoneBundle {
    pub current_zones: Vec<DangerZone>,
    pub spreading_predictions: Vec<SpreadingPrediction>,
    pub evacuation_zones: Vec<EvacuationZone>,
    pub total_zones: usize,
    pub critical_zones: usize,
    pub generated_at: DateTime<Utc>,
}

pub struct DangerZonePredictor {
    cache: TtlCache<DangerZoneBundle>,
}

impl DangerZonePredictor {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(ttl),
        }
    }

    /// Cached bundle if it has not expired at `now`
    pub fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<DangerZoneBundle>> {
        self.cache.fresh(now)
    }

    /// Bundle for the given inputs, reusing the cached one inside the TTL
    ///
    /// `velocity` is the prediction engine's events/hour figure.
    pub fn danger_zones(
        &mut self,
        events: &[CrisisEvent],
        hotspots: &[HotspotCell],
        velocity: f64,
        now: DateTime<Utc>,
    ) -> Arc<DangerZoneBundle> {
        self.cache.get_or_refresh(now, || {
            let bundle = compute_danger_zones(events, hotspots, velocity, now);
            log::debug!(
                "Recomputed {} danger zones ({} critical, {} evacuations)",
                bundle.total_zones,
                bundle.critical_zones,
                bundle.evacuation_zones.len()
            );
            bundle
        })
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}

pub fn compute_danger_zones(
    events: &[CrisisEvent],
    hotspots: &[HotspotCell],
    velocity: f64,
    now: DateTime<Utc>,
) -> DangerZoneBundle {
    let current_zones = identify_danger_zones(events, hotspots);

    let spreading_predictions = current_zones
        .iter()
        .take(SPREAD_ZONES)
        .flat_map(|zone| {
            HORIZONS_MINUTES
                .into_iter()
                .map(move |horizon| predict_spreading(zone, velocity, horizon))
        })
        .collect();

    let evacuation_zones = evacuation_zones(&current_zones);
    let critical_zones = current_zones
        .iter()
        .filter(|z| z.threat_level == ThreatLevel::Critical)
        .count();

    DangerZoneBundle {
        total_zones: current_zones.len(),
        critical_zones,
        current_zones,
        spreading_predictions,
        evacuation_zones,
        generated_at: now,
    }
}

/// Zone radius grows 2 km per event on top of a 5 km base, capped at 50 km
pub fn zone_radius_km(event_count: usize) -> f64 {
    (BASE_RADIUS_KM + event_count as f64 * RADIUS_KM_PER_EVENT).min(MAX_RADIUS_KM)
}

/// Zones for the top five hotspots, most intense first
pub fn identify_danger_zones(events: &[CrisisEvent], hotspots: &[HotspotCell]) -> Vec<DangerZone> {
    let mut zones: Vec<DangerZone> = hotspots
        .iter()
        .take(MAX_ZONES)
        .map(|cell| {
            let radius_km = zone_radius_km(cell.event_count);
            let (intensity, primary_type) =
                zone_intensity(events, cell.grid_lat, cell.grid_lon, radius_km);

            DangerZone {
                zone_id: format!("zone_{:.2}_{:.2}", cell.grid_lat, cell.grid_lon),
                center_lat: cell.grid_lat,
                center_lon: cell.grid_lon,
                radius_km,
                intensity: round_to(intensity, 1),
                threat_level: ThreatLevel::from_intensity(intensity),
                event_count: cell.event_count,
                primary_type,
            }
        })
        .collect();

    zones.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    zones
}

/// Distance-weighted mean severity of located events within `radius_km`,
/// plus the most frequent crisis type among them
///
/// Returns `(0.0, "multi-hazard")` when no event falls inside the radius.
pub fn zone_intensity(
    events: &[CrisisEvent],
    center_lat: f64,
    center_lon: f64,
    radius_km: f64,
) -> (f64, String) {
    let mut weighted_sum = 0.0;
    let mut inside = 0usize;
    let mut types: Vec<(&str, usize)> = Vec::new();

    for event in events {
        let location = event.location();
        if !location.has_coordinates() {
            continue;
        }

        let distance = haversine_km(center_lat, center_lon, location.lat, location.lon);
        if distance > radius_km {
            continue;
        }

        weighted_sum += event.severity_score() * (1.0 - distance / radius_km);
        inside += 1;

        let crisis_type = event.crisis_type();
        match types.iter_mut().find(|(t, _)| *t == crisis_type) {
            Some((_, count)) => *count += 1,
            None => types.push((crisis_type, 1)),
        }
    }

    if inside == 0 {
        return (0.0, MULTI_HAZARD.to_string());
    }

    let mut primary: Option<(&str, usize)> = None;
    for &(crisis_type, count) in &types {
        if primary.map_or(true, |(_, c)| count > c) {
            primary = Some((crisis_type, count));
        }
    }

    (
        weighted_sum / inside as f64,
        primary.map_or(MULTI_HAZARD, |(t, _)| t).to_string(),
    )
}

/// Projected radius of `zone` after `horizon_minutes`, spreading at half the
/// event velocity in km/h (capped at 10 km/h)
pub fn predict_spreading(zone: &DangerZone, velocity: f64, horizon_minutes: u32) -> SpreadingPrediction {
    let spread_rate = (velocity * 0.5).min(MAX_SPREAD_KM_PER_HOUR);
    let predicted = zone.radius_km + spread_rate * (horizon_minutes as f64 / 60.0);

    SpreadingPrediction {
        zone_id: zone.zone_id.clone(),
        center_lat: zone.center_lat,
        center_lon: zone.center_lon,
        current_radius_km: zone.radius_km,
        // A shrinking zone bottoms out at its center
        predicted_radius_km: predicted.max(0.0),
        spread_rate_km_per_hour: round_to(spread_rate, 2),
        time_horizon_minutes: horizon_minutes,
        intensity: zone.intensity,
        threat_level: zone.threat_level,
    }
}

pub fn evacuation_zones(zones: &[DangerZone]) -> Vec<EvacuationZone> {
    zones
        .iter()
        .filter(|zone| zone.threat_level.requires_evacuation())
        .map(|zone| {
            let radius = zone.radius_km * EVACUATION_RADIUS_FACTOR;
            let population = (PI * radius * radius * POPULATION_DENSITY_PER_KM2).round() as u64;

            EvacuationZone {
                zone_id: zone.zone_id.clone(),
                center_lat: zone.center_lat,
                center_lon: zone.center_lon,
                evacuation_radius_km: round_to(radius, 1),
                danger_radius_km: zone.radius_km,
                estimated_population: population,
                threat_level: zone.threat_level,
                primary_threat: zone.primary_type.clone(),
                priority: if zone.threat_level == ThreatLevel::Critical {
                    EvacuationPriority::Immediate
                } else {
                    EvacuationPriority::Urgent
                },
            }
        })
        .collect()
}
