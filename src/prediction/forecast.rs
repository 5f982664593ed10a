//! Escalation forecast per time horizon

use super::fine_hotspots::FineHotspot;
use super::trend::Trend;
use crate::events::Location;
use crate::geo::round_to;
use serde::{Deserialize, Serialize};

/// Forecast horizons in minutes
pub const HORIZONS_MINUTES: [u32; 3] = [30, 60, 120];

/// Horizon at which the time factor reaches zero
const TIME_FACTOR_SPAN_MINUTES: f64 = 240.0;

/// Rough urban population exposed per active hotspot
const POPULATION_PER_HOTSPOT: f64 = 5000.0;

/// Acceleration (events/hour²) that shifts the base probability
const ACCELERATION_SHIFT_THRESHOLD: f64 = 10.0;
const ACCELERATION_SHIFT: f64 = 15.0;

/// Crisis type reported when no fine hotspot exists
pub const MULTI_HAZARD: &str = "multi-hazard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn from_probability(probability: f64) -> Self {
        if probability > 75.0 {
            Severity::Critical
        } else if probability > 50.0 {
            Severity::High
        } else if probability > 30.0 {
            Severity::Moderate
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisPrediction {
    pub time_horizon: u32,
    pub probability: f64,
    pub confidence: f64,
    pub severity: Severity,
    pub affected_population: u64,
    pub key_factors: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub location: Location,
    pub crisis_type: String,
}

/// Everything the forecast depends on, computed once per cycle
#[derive(Debug, Clone)]
pub struct ForecastInputs<'a> {
    pub velocity: f64,
    pub trend: Trend,
    pub acceleration: f64,
    /// Events in the prediction window
    pub event_count: usize,
    /// Fine hotspots, most intense first
    pub hotspots: &'a [FineHotspot],
    /// Critical-urgency social reports currently in the event cache
    pub critical_reports: usize,
}

/// Starting probability for a trend, shifted by strong acceleration
pub fn base_probability(trend: Trend, acceleration: f64) -> f64 {
    let base: f64 = match trend {
        Trend::EscalatingRapidly => 85.0,
        Trend::Escalating => 70.0,
        Trend::Stable => 40.0,
        Trend::Decreasing => 20.0,
    };

    let shifted = if acceleration > ACCELERATION_SHIFT_THRESHOLD {
        base + ACCELERATION_SHIFT
    } else if acceleration < -ACCELERATION_SHIFT_THRESHOLD {
        base - ACCELERATION_SHIFT
    } else {
        base
    };

    shifted.clamp(0.0, 100.0)
}

/// Unrounded escalation probability; non-increasing in `horizon_minutes`
pub fn escalation_probability(trend: Trend, acceleration: f64, horizon_minutes: u32) -> f64 {
    let time_factor = 1.0 - horizon_minutes as f64 / TIME_FACTOR_SPAN_MINUTES;
    base_probability(trend, acceleration) * (0.5 + 0.5 * time_factor)
}

/// More events give more confidence; stable trends are discounted
pub fn confidence(event_count: usize, trend: Trend) -> f64 {
    let confidence = (event_count as f64 / 2.0).min(100.0);
    if trend == Trend::Stable {
        confidence * 0.8
    } else {
        confidence
    }
}

/// One prediction per horizon in `HORIZONS_MINUTES`
pub fn predict_escalation(inputs: &ForecastInputs<'_>) -> Vec<CrisisPrediction> {
    let factors = key_factors(inputs);
    let confidence = round_to(confidence(inputs.event_count, inputs.trend), 1);

    let (location, crisis_type) = match inputs.hotspots.first() {
        Some(top) => (Location::new(top.lat, top.lon), top.primary_type.clone()),
        None => (Location::new(0.0, 0.0), MULTI_HAZARD.to_string()),
    };

    HORIZONS_MINUTES
        .iter()
        .map(|&horizon| {
            let probability = escalation_probability(inputs.trend, inputs.acceleration, horizon);
            let severity = Severity::from_probability(probability);
            let affected_population = (inputs.hotspots.len() as f64
                * POPULATION_PER_HOTSPOT
                * (probability / 100.0))
                .round() as u64;

            CrisisPrediction {
                time_horizon: horizon,
                probability: round_to(probability, 1),
                confidence,
                severity,
                affected_population,
                key_factors: factors.clone(),
                recommended_actions: recommended_actions(severity, horizon),
                location: location.clone(),
                crisis_type: crisis_type.clone(),
            }
        })
        .collect()
}

fn key_factors(inputs: &ForecastInputs<'_>) -> Vec<String> {
    let mut factors = Vec::new();

    if inputs.velocity > 20.0 {
        factors.push(format!("Event velocity: {:.1} events/hour", inputs.velocity));
    }
    if inputs.acceleration > 5.0 {
        factors.push(format!("Accelerating at {:.1} events/hour²", inputs.acceleration));
    }
    if inputs.critical_reports > 20 {
        factors.push(format!("{} critical reports active", inputs.critical_reports));
    }
    if inputs.hotspots.len() > 3 {
        factors.push(format!("{} geographic hotspots detected", inputs.hotspots.len()));
    }

    if factors.is_empty() {
        factors.push(format!(
            "Activity trend {} across {} events",
            inputs.trend.as_str(),
            inputs.event_count
        ));
    }

    factors
}

fn recommended_actions(severity: Severity, horizon_minutes: u32) -> Vec<String> {
    let actions: &[&str] = match severity {
        Severity::Critical | Severity::High if horizon_minutes <= 30 => &[
            "Initiate emergency response protocols",
            "Pre-deploy resources to hotspot areas",
            "Issue immediate evacuation orders",
        ],
        Severity::Critical | Severity::High => &[
            "Initiate emergency response protocols",
            "Pre-deploy resources to hotspot areas",
        ],
        Severity::Moderate => &["Increase monitoring frequency", "Alert response teams"],
        Severity::Low => &["Continue standard monitoring"],
    };

    actions.iter().map(|a| a.to_string()).collect()
}
