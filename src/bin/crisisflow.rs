//! crisisflow runtime
//!
//! Reads broker output as newline-delimited `StreamEnvelope` JSON on stdin
//! (`{"topic": "weather_risks" | "social_signals", "event": {...}}`), keeps
//! the event cache and derived views current, and snapshots the cache to
//! disk. Stops on stdin EOF or CTRL+C, after a final snapshot.
//!
//! Usage:
//!   cargo run --release --bin simulate | cargo run --release --bin crisisflow
//!
//! Environment variables: see `CrisisConfig::from_env`.

use crisisflow::engine::{CrisisEngine, SharedEngine};
use crisisflow::events::StreamEnvelope;
use crisisflow::ingestion::{ingest_channel, run_ingestion, IngestSender};
use crisisflow::persistence::{load_snapshot, open_backend, spawn_persistence_task};
use crisisflow::CrisisConfig;
use dotenv::dotenv;
use log::{error, info, warn};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 crisisflow runtime");

    let config = CrisisConfig::from_env()?;
    info!("   ├─ Event cache: {} per stream", config.event_cache_size);
    info!("   ├─ Prediction window: {} events", config.prediction_window_size);
    info!("   ├─ Snapshot every {:?}", config.snapshot_interval);
    info!("   └─ Channel buffer: {} events", config.channel_buffer);

    // Restore before anything can ingest
    let mut backend = open_backend(&config)?;
    let snapshot = load_snapshot(backend.as_mut()).await;

    let mut engine = CrisisEngine::new(&config);
    engine.restore(snapshot);
    let engine = engine.into_shared();
    info!("✅ CrisisEngine created");

    let persistence =
        spawn_persistence_task(engine.clone(), backend, config.snapshot_interval).await;

    let (tx, rx) = ingest_channel(config.channel_buffer);
    let ingestion = tokio::spawn(run_ingestion(rx, engine.clone(), config.summary_interval_ms));

    let reporter = tokio::spawn(report_loop(
        engine.clone(),
        Duration::from_millis(config.summary_interval_ms.max(1000)),
    ));

    info!("🔄 Reading events from stdin (CTRL+C to stop)");

    tokio::select! {
        result = read_stdin(tx.clone()) => {
            match result {
                Ok(lines) => info!("📭 stdin closed after {} lines", lines),
                Err(e) => error!("❌ stdin reader failed: {}", e),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => warn!("⚠️  Received CTRL+C, shutting down..."),
                Err(e) => error!("❌ Failed to listen for CTRL+C: {}", e),
            }
        }
    }

    // Drain what is already queued, then stop
    if let Err(e) = tx.shutdown().await {
        warn!("⚠️  Ingestion already stopped: {}", e);
    }
    match ingestion.await {
        Ok(stats) => info!("   ├─ Ingested {} events ({} rejected)", stats.accepted, stats.rejected),
        Err(e) => error!("❌ Ingestion task failed: {}", e),
    }
    reporter.abort();

    persistence.shutdown().await;

    info!("✅ crisisflow stopped");
    Ok(())
}

/// Forward stdin lines into the ingestion channel; returns the line count
async fn read_stdin(tx: IngestSender) -> Result<u64, Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut count = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        count += 1;

        match serde_json::from_str::<StreamEnvelope>(line) {
            Ok(envelope) => tx.send_envelope(envelope).await?,
            Err(e) => warn!("⚠️  Skipping line {}: not a stream envelope ({})", count, e),
        }
    }

    Ok(count)
}

/// Periodically log a one-line view of every derived result
async fn report_loop(engine: SharedEngine, period: Duration) {
    let mut timer = tokio::time::interval(period);
    timer.tick().await;

    loop {
        timer.tick().await;

        let mut engine = engine.lock().await;
        if engine.is_empty() {
            continue;
        }

        let hotspots = engine.hotspots();
        let predictions = engine.predictions();
        let zones = engine.danger_zones();
        let metrics = engine.metrics();

        info!(
            "🗺️  {} hotspots | trend {} ({:.1} ev/h) | {} zones, {} critical, {} evacuations",
            hotspots.len(),
            predictions.metrics.trend.as_str(),
            predictions.metrics.velocity,
            zones.total_zones,
            zones.critical_zones,
            zones.evacuation_zones.len()
        );

        if let Some(next) = predictions.predictions.first() {
            info!(
                "🔮 {}-min outlook: {} ({:.1}%) near ({:.2}, {:.2}) - {}",
                next.time_horizon,
                next.severity.as_str(),
                next.probability,
                next.location.lat,
                next.location.lon,
                next.crisis_type
            );
        }

        info!(
            "📊 {:.2} ev/s (peak {:.2}) | {:.2}ms latency | {} processed | up {}s",
            metrics.events_per_second,
            metrics.peak_events_per_second,
            metrics.processing_latency_ms,
            metrics.total_events_processed,
            metrics.uptime_seconds
        );
    }
}
