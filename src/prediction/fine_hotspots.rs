//! High-resolution (0.05°) clusters inside the prediction window

use crate::events::CrisisEvent;
use crate::geo::{grid_center, grid_index};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cell size of the fine grid in degrees
pub const FINE_GRID_DEG: f64 = 0.05;

/// A cell needs at least this many events to count as a hotspot
pub const MIN_HOTSPOT_EVENTS: usize = 3;

/// Hotspots returned per call, by intensity
pub const MAX_FINE_HOTSPOTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineHotspot {
    pub lat: f64,
    pub lon: f64,
    /// Mean severity score of the cell's events
    pub intensity: f64,
    pub event_count: usize,
    pub primary_type: String,
}

#[derive(Default)]
struct FineCell<'a> {
    event_count: usize,
    severity_sum: f64,
    // Insertion ordered so ties resolve to the first type seen
    types: Vec<(&'a str, usize)>,
}

impl<'a> FineCell<'a> {
    fn add(&mut self, event: &'a CrisisEvent) {
        self.event_count += 1;
        self.severity_sum += event.severity_score();

        let crisis_type = event.crisis_type();
        match self.types.iter_mut().find(|(t, _)| *t == crisis_type) {
            Some((_, count)) => *count += 1,
            None => self.types.push((crisis_type, 1)),
        }
    }

    fn primary_type(&self) -> &'a str {
        let mut best: Option<(&'a str, usize)> = None;
        for &(crisis_type, count) in &self.types {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((crisis_type, count));
            }
        }
        best.map_or("unknown", |(t, _)| t)
    }
}

/// Group located events into 0.05° cells and keep the ten most intense
/// cells holding at least three events
///
/// Events with a 0 placeholder for either coordinate are skipped.
pub fn identify_fine_hotspots(events: &[CrisisEvent]) -> Vec<FineHotspot> {
    let mut cells: HashMap<(i64, i64), FineCell<'_>> = HashMap::new();

    for event in events {
        let location = event.location();
        if !location.has_coordinates() {
            continue;
        }
        let key = (
            grid_index(location.lat, FINE_GRID_DEG),
            grid_index(location.lon, FINE_GRID_DEG),
        );
        cells.entry(key).or_default().add(event);
    }

    let mut hotspots: Vec<FineHotspot> = cells
        .into_iter()
        .filter(|(_, cell)| cell.event_count >= MIN_HOTSPOT_EVENTS)
        .map(|((lat_idx, lon_idx), cell)| FineHotspot {
            lat: grid_center(lat_idx, FINE_GRID_DEG),
            lon: grid_center(lon_idx, FINE_GRID_DEG),
            intensity: cell.severity_sum / cell.event_count as f64,
            event_count: cell.event_count,
            primary_type: cell.primary_type().to_string(),
        })
        .collect();

    // Count and coordinates break intensity ties so output is stable across runs
    hotspots.sort_by(|a, b| {
        b.intensity
            .total_cmp(&a.intensity)
            .then_with(|| b.event_count.cmp(&a.event_count))
            .then_with(|| a.lat.total_cmp(&b.lat))
            .then_with(|| a.lon.total_cmp(&b.lon))
    });
    hotspots.truncate(MAX_FINE_HOTSPOTS);
    hotspots
}
