//! Synthetic event producer
//!
//! Prints newline-delimited `StreamEnvelope` JSON to stdout, alternating
//! weather readings over a fixed set of cities with social reports jittered
//! around them. Pipe it into the `crisisflow` binary.
//!
//! Usage:
//!   cargo run --bin simulate -- [--count N] [--interval-ms M] [--social-ratio R]
//!
//! `--count 0` runs until the reader goes away.

use chrono::Utc;
use crisisflow::events::{
    Location, SocialData, SocialSignalEvent, StreamEnvelope, StreamKind, Urgency, WeatherData,
    WeatherRiskEvent,
};
use crisisflow::risk_index::{fire_index, flood_index, risk_level_for};
use dotenv::dotenv;
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::env;
use std::io::Write;
use std::time::Duration;

const CITIES: &[(&str, f64, f64)] = &[
    ("Los Angeles", 34.0522, -118.2437),
    ("Houston", 29.7604, -95.3698),
    ("Phoenix", 33.4484, -112.0740),
    ("San Diego", 32.7157, -117.1611),
    ("Miami", 25.7617, -80.1918),
    ("New Orleans", 29.9511, -90.0715),
    ("Sacramento", 38.5816, -121.4944),
    ("Denver", 39.7392, -104.9903),
];

/// (category, urgency, text) templates for social reports
const REPORTS: &[(&str, Urgency, &str)] = &[
    ("fire", Urgency::Critical, "Wildfire jumped the highway, evacuate now"),
    ("fire", Urgency::High, "Heavy smoke and flames visible from the ridge"),
    ("fire", Urgency::Medium, "Smell of smoke downtown, ash falling"),
    ("flood", Urgency::Critical, "Water rising fast, people trapped on rooftops"),
    ("flood", Urgency::High, "Streets flooded, cars stalled at the underpass"),
    ("flood", Urgency::Medium, "Standing water on several roads after the rain"),
    ("storm", Urgency::High, "Power lines down after strong winds"),
    ("earthquake", Urgency::Critical, "Building collapse reported after the quake"),
    ("infrastructure", Urgency::Low, "Traffic lights out at a major intersection"),
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let count: u64 = parse_arg("--count").unwrap_or(200);
    let interval_ms: u64 = parse_arg("--interval-ms").unwrap_or(100);
    let social_ratio: f64 = parse_arg::<f64>("--social-ratio")
        .unwrap_or(0.6)
        .clamp(0.0, 1.0);

    // Logs go to stderr; stdout carries only envelopes
    info!("🚀 Simulating crisis events");
    info!("   ├─ Count: {}", if count == 0 { "unbounded".to_string() } else { count.to_string() });
    info!("   ├─ Interval: {}ms", interval_ms);
    info!("   └─ Social ratio: {:.2}", social_ratio);

    let mut rng = rand::thread_rng();
    let stdout = std::io::stdout();
    let mut sent = 0u64;

    while count == 0 || sent < count {
        let envelope = if rng.gen_bool(social_ratio) {
            social_envelope(&mut rng, sent)?
        } else {
            weather_envelope(&mut rng, sent)?
        };

        let line = serde_json::to_string(&envelope)?;
        let mut out = stdout.lock();
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!("⚠️  Output closed after {} events: {}", sent, e);
            break;
        }
        drop(out);

        sent += 1;
        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    info!("✅ Emitted {} events", sent);
    Ok(())
}

/// Value following `flag`, if present and parseable
fn parse_arg<T: std::str::FromStr>(flag: &str) -> Option<T> {
    let args: Vec<String> = env::args().collect();
    let idx = args.iter().position(|x| x == flag)?;
    match args.get(idx + 1).map(|s| s.parse::<T>()) {
        Some(Ok(value)) => Some(value),
        _ => {
            warn!("⚠️  Ignoring {}: expected a value", flag);
            None
        }
    }
}

fn weather_envelope<R: Rng>(rng: &mut R, seq: u64) -> serde_json::Result<StreamEnvelope> {
    let (name, lat, lon) = *CITIES.choose(rng).unwrap_or(&CITIES[0]);

    let temperature = rng.gen_range(5.0..45.0);
    let humidity = rng.gen_range(5.0..100.0);
    let wind_speed = rng.gen_range(0.0..25.0);
    // Mostly dry, with the occasional downpour
    let precipitation = if rng.gen_bool(0.2) {
        rng.gen_range(5.0..60.0)
    } else {
        rng.gen_range(0.0..2.0)
    };

    let fire = fire_index(temperature, humidity, wind_speed);
    let flood = flood_index(precipitation, humidity);

    let event = WeatherRiskEvent {
        event_id: format!("sim-w-{:06}-{:08x}", seq, rng.gen::<u32>()),
        source: "simulator".to_string(),
        location: Location {
            name: Some(name.to_string()),
            lat,
            lon,
        },
        data: WeatherData {
            fire_index: fire,
            flood_index: flood,
            temperature,
            humidity,
            wind_speed,
            wind_direction: rng.gen_range(0.0..360.0),
            precipitation_intensity: precipitation,
        },
        risk_level: risk_level_for(fire, flood),
        timestamp: Utc::now(),
    };

    Ok(StreamEnvelope {
        topic: StreamKind::Weather.topic().to_string(),
        event: serde_json::to_value(event)?,
    })
}

fn social_envelope<R: Rng>(rng: &mut R, seq: u64) -> serde_json::Result<StreamEnvelope> {
    let (name, lat, lon) = *CITIES.choose(rng).unwrap_or(&CITIES[0]);
    let (category, urgency, text) = *REPORTS.choose(rng).unwrap_or(&REPORTS[0]);

    let event = SocialSignalEvent {
        event_id: format!("sim-s-{:06}-{:08x}", seq, rng.gen::<u32>()),
        source: "social".to_string(),
        location: Location {
            name: Some(name.to_string()),
            lat: lat + rng.gen_range(-0.02..0.02),
            lon: lon + rng.gen_range(-0.02..0.02),
        },
        data: SocialData {
            text: text.to_string(),
            category: category.to_string(),
            urgency,
            verified: rng.gen_bool(1.0 / 3.0),
        },
        timestamp: Utc::now(),
    };

    Ok(StreamEnvelope {
        topic: StreamKind::Social.topic().to_string(),
        event: serde_json::to_value(event)?,
    })
}
