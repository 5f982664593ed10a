use super::{save_snapshot, SnapshotBackend};
use crate::engine::SharedEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// Owner of the background snapshot task
///
/// Dropping the handle without calling `shutdown` still lets the task write
/// its final snapshot, but nobody waits for it.
pub struct PersistenceHandle {
    flush: Arc<Notify>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PersistenceHandle {
    /// Ask for a snapshot now instead of at the next tick
    pub fn request_flush(&self) {
        self.flush.notify_one();
    }

    /// Stop the task after one final snapshot, and wait for it
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            log::error!("❌ Persistence task failed: {}", e);
        }
    }
}

/// Spawn the task snapshotting `engine` every `period`
///
/// The first snapshot is taken one full period after start; the restored
/// state is already on disk. The engine is wired to request a snapshot
/// whenever it is cleared.
pub async fn spawn_persistence_task(
    engine: SharedEngine,
    backend: Box<dyn SnapshotBackend>,
    period: Duration,
) -> PersistenceHandle {
    let flush = Arc::new(Notify::new());
    engine.lock().await.set_flush_signal(Arc::clone(&flush));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(persistence_loop(
        engine,
        backend,
        period,
        Arc::clone(&flush),
        shutdown_rx,
    ));

    PersistenceHandle {
        flush,
        shutdown_tx: Some(shutdown_tx),
        task,
    }
}

async fn persistence_loop(
    engine: SharedEngine,
    mut backend: Box<dyn SnapshotBackend>,
    period: Duration,
    flush: Arc<Notify>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    log::info!(
        "💾 Persistence task started ({} backend, every {:?})",
        backend.backend_type(),
        period
    );

    let mut timer = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                flush_once(&engine, backend.as_mut()).await;
            }
            _ = flush.notified() => {
                flush_once(&engine, backend.as_mut()).await;
            }
            _ = &mut shutdown_rx => {
                log::info!("🔄 Writing final snapshot...");
                if flush_once(&engine, backend.as_mut()).await {
                    log::info!("✅ Final snapshot written");
                }
                break;
            }
        }
    }
}

async fn flush_once(engine: &SharedEngine, backend: &mut dyn SnapshotBackend) -> bool {
    // Copy under the lock, write without it
    let snapshot = {
        let engine = engine.lock().await;
        engine.snapshot()
    };

    match save_snapshot(backend, &snapshot).await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("⚠️  Failed to save snapshot: {}", e);
            false
        }
    }
}
