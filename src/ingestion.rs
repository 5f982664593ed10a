//! Ingestion loop - decodes stream messages and feeds the engine
//!
//! Producers (the stdin adapter, the simulator, tests) push `IngestMessage`s
//! into a bounded channel. The loop decodes raw payloads, appends events to
//! the engine and logs a throughput summary on a timer. A bad payload is
//! logged and dropped; nothing here stops the loop except channel closure or
//! an explicit `Shutdown`.

use crate::engine::SharedEngine;
use crate::error::{CrisisError, CrisisResult};
use crate::events::{decode_event, CrisisEvent, StreamEnvelope, StreamKind};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::interval;

#[derive(Debug)]
pub enum IngestMessage {
    /// Already decoded event
    Event(CrisisEvent),
    /// Raw payload from one of the broker topics
    Raw { stream: StreamKind, payload: Value },
    Shutdown,
}

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub rejected: u64,
}

/// Sending half of the ingestion channel
#[derive(Clone)]
pub struct IngestSender {
    tx: mpsc::Sender<IngestMessage>,
}

impl IngestSender {
    pub async fn send_event(&self, event: CrisisEvent) -> CrisisResult<()> {
        self.send(IngestMessage::Event(event)).await
    }

    pub async fn send_raw(&self, stream: StreamKind, payload: Value) -> CrisisResult<()> {
        self.send(IngestMessage::Raw { stream, payload }).await
    }

    /// Route an envelope by topic; unknown topics are dropped with a warning
    pub async fn send_envelope(&self, envelope: StreamEnvelope) -> CrisisResult<()> {
        match StreamKind::from_topic(&envelope.topic) {
            Some(stream) => self.send_raw(stream, envelope.event).await,
            None => {
                log::warn!("⚠️  Dropping message from unknown topic '{}'", envelope.topic);
                Ok(())
            }
        }
    }

    pub async fn shutdown(&self) -> CrisisResult<()> {
        self.send(IngestMessage::Shutdown).await
    }

    async fn send(&self, message: IngestMessage) -> CrisisResult<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| CrisisError::ChannelClosed)
    }
}

/// Bounded ingestion channel
pub fn ingest_channel(buffer: usize) -> (IngestSender, mpsc::Receiver<IngestMessage>) {
    let (tx, rx) = mpsc::channel(buffer);
    (IngestSender { tx }, rx)
}

/// Run until the channel closes or a `Shutdown` message arrives
///
/// Every `summary_interval_ms` the loop logs ingestion rate and cache size.
pub async fn run_ingestion(
    mut rx: mpsc::Receiver<IngestMessage>,
    engine: SharedEngine,
    summary_interval_ms: u64,
) -> IngestStats {
    log::info!("🚀 Starting crisis event ingestion");
    log::info!("   ├─ Summary interval: {}ms", summary_interval_ms);
    log::info!("   └─ Waiting for events...");

    let mut summary_timer = interval(Duration::from_millis(summary_interval_ms.max(1)));
    let mut stats = IngestStats::default();
    let mut window_count = 0u64;
    let mut window_start = Instant::now();

    loop {
        tokio::select! {
            message = rx.recv() => {
                let received = Instant::now();
                let event = match message {
                    Some(IngestMessage::Event(event)) => event,
                    Some(IngestMessage::Raw { stream, payload }) => match decode_event(stream, payload) {
                        Ok(event) => event,
                        Err(e) => {
                            stats.rejected += 1;
                            log::warn!("⚠️  Dropping malformed {} event: {}", stream.as_str(), e);
                            continue;
                        }
                    },
                    Some(IngestMessage::Shutdown) => {
                        log::info!("🛑 Shutdown requested, stopping ingestion");
                        break;
                    }
                    None => {
                        log::warn!("⚠️  Event channel closed, stopping ingestion");
                        break;
                    }
                };

                log::debug!(
                    "Ingested {} event {} at ({:.3}, {:.3}) severity {}",
                    event.stream().as_str(),
                    event.event_id(),
                    event.location().lat,
                    event.location().lon,
                    event.severity_score()
                );

                {
                    let mut engine = engine.lock().await;
                    engine.ingest_received_at(event, received);
                }
                stats.accepted += 1;
                window_count += 1;
            }

            _ = summary_timer.tick() => {
                let elapsed = window_start.elapsed().as_secs_f64();
                if window_count > 0 && elapsed > 0.0 {
                    let cached = engine.lock().await.len();
                    log::info!(
                        "📊 Ingestion rate: {:.1} events/sec (total: {}, rejected: {}, cached: {})",
                        window_count as f64 / elapsed,
                        stats.accepted,
                        stats.rejected,
                        cached
                    );
                }
                window_count = 0;
                window_start = Instant::now();
            }
        }
    }

    log::info!(
        "✅ Ingestion stopped ({} accepted, {} rejected)",
        stats.accepted,
        stats.rejected
    );
    stats
}
