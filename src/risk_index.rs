//! Producer-side risk indices derived from raw weather readings

use crate::events::RiskLevel;

/// Fire weather index in [0, 100]
///
/// Temperature contributes up to 40 points (0-40 °C), dryness up to 40
/// (`40 - 0.4 * humidity`) and wind up to 20 (m/s).
pub fn fire_index(temperature: f64, humidity: f64, wind_speed: f64) -> f64 {
    let temp_factor = temperature.clamp(0.0, 40.0);
    let humidity_factor = (40.0 - humidity * 0.4).max(0.0);
    let wind_factor = wind_speed.min(20.0);

    (temp_factor + humidity_factor + wind_factor).trunc().clamp(0.0, 100.0)
}

/// Flood index in [0, 100] from precipitation intensity (mm/h) with humidity
/// standing in for soil moisture
pub fn flood_index(precipitation: f64, humidity: f64) -> f64 {
    let precip_factor = if precipitation < 2.5 {
        precipitation * 10.0
    } else if precipitation < 10.0 {
        25.0 + (precipitation - 2.5) * 4.0
    } else if precipitation < 50.0 {
        55.0 + (precipitation - 10.0)
    } else {
        95.0
    };

    (precip_factor + humidity * 0.05).trunc().clamp(0.0, 100.0)
}

/// Classify by the larger of the two indices
pub fn risk_level_for(fire_index: f64, flood_index: f64) -> RiskLevel {
    let max_index = fire_index.max(flood_index);
    if max_index >= 70.0 {
        RiskLevel::Critical
    } else if max_index >= 50.0 {
        RiskLevel::High
    } else if max_index >= 30.0 {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}
