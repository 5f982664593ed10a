//! Coarse geographic hotspots over the event cache
//!
//! Every event is snapped to a 0.5° grid. Each touched cell becomes one
//! `HotspotCell` carrying counts, mean fire/flood indices and the most
//! severe risk observed. Cells are rebuilt from scratch on every refresh.

use crate::events::RiskLevel;
use crate::geo::{grid_center, grid_index, round_to};
use crate::state::EventCache;
use crate::ttl::TtlCache;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Cell size of the hotspot grid in degrees
pub const HOTSPOT_GRID_DEG: f64 = 0.5;

/// Nominal aggregation window reported on each cell
const WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotCell {
    pub grid_lat: f64,
    pub grid_lon: f64,
    pub event_count: usize,
    pub avg_fire_index: f64,
    pub avg_flood_index: f64,
    pub social_count: usize,
    pub risk_level: RiskLevel,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[derive(Default)]
struct CellAccumulator {
    weather_count: usize,
    social_count: usize,
    fire_sum: f64,
    flood_sum: f64,
    max_risk: RiskLevel,
}

/// TTL-cached builder of `HotspotCell`s
pub struct HotspotAggregator {
    cache: TtlCache<Vec<HotspotCell>>,
}

impl HotspotAggregator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: TtlCache::new(ttl),
        }
    }

    /// Hotspots for the cache contents, reusing the previous result inside the TTL
    pub fn hotspots(&mut self, events: &EventCache, now: DateTime<Utc>) -> Arc<Vec<HotspotCell>> {
        self.cache.get_or_refresh(now, || {
            let cells = compute_hotspots(events, now);
            log::debug!("Recomputed {} hotspot cells", cells.len());
            cells
        })
    }

    /// Last computed cells and when they were computed, for snapshotting
    pub fn last_computed(&self) -> Option<(Arc<Vec<HotspotCell>>, DateTime<Utc>)> {
        self.cache.last()
    }

    pub fn seed(&mut self, cells: Vec<HotspotCell>, computed_at: DateTime<Utc>) {
        self.cache.seed(cells, computed_at);
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}

/// Build hotspot cells from both streams, most severe first
///
/// Order: risk level descending, then event count descending. Social reports
/// contribute to `social_count`, `event_count` and (through their urgency)
/// to the cell's risk level.
pub fn compute_hotspots(events: &EventCache, now: DateTime<Utc>) -> Vec<HotspotCell> {
    let mut order: Vec<(i64, i64)> = Vec::new();
    let mut cells: HashMap<(i64, i64), CellAccumulator> = HashMap::new();

    for event in events.weather() {
        let cell = cell_at(&mut cells, &mut order, event.location.lat, event.location.lon);
        cell.weather_count += 1;
        cell.fire_sum += event.data.fire_index;
        cell.flood_sum += event.data.flood_index;
        cell.max_risk = cell.max_risk.max(event.risk_level);
    }

    for event in events.social() {
        let cell = cell_at(&mut cells, &mut order, event.location.lat, event.location.lon);
        cell.social_count += 1;
        cell.max_risk = cell.max_risk.max(event.data.urgency.as_risk_level());
    }

    let window_start = now - ChronoDuration::minutes(WINDOW_MINUTES);

    let mut hotspots: Vec<HotspotCell> = order
        .into_iter()
        .filter_map(|key| cells.remove(&key).map(|cell| (key, cell)))
        .map(|((lat_idx, lon_idx), cell)| {
            let (avg_fire, avg_flood) = if cell.weather_count > 0 {
                (
                    cell.fire_sum / cell.weather_count as f64,
                    cell.flood_sum / cell.weather_count as f64,
                )
            } else {
                (0.0, 0.0)
            };

            HotspotCell {
                grid_lat: grid_center(lat_idx, HOTSPOT_GRID_DEG),
                grid_lon: grid_center(lon_idx, HOTSPOT_GRID_DEG),
                event_count: cell.weather_count + cell.social_count,
                avg_fire_index: round_to(avg_fire, 1),
                avg_flood_index: round_to(avg_flood, 1),
                social_count: cell.social_count,
                risk_level: cell.max_risk,
                window_start,
                window_end: now,
            }
        })
        .collect();

    hotspots.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then_with(|| b.event_count.cmp(&a.event_count))
    });

    hotspots
}

fn cell_at<'a>(
    cells: &'a mut HashMap<(i64, i64), CellAccumulator>,
    order: &mut Vec<(i64, i64)>,
    lat: f64,
    lon: f64,
) -> &'a mut CellAccumulator {
    let key = (
        grid_index(lat, HOTSPOT_GRID_DEG),
        grid_index(lon, HOTSPOT_GRID_DEG),
    );
    cells.entry(key).or_insert_with(|| {
        order.push(key);
        CellAccumulator::default()
    })
}
