//! `StoreManager`: write-behind wrapper over a [`JobStore`] for the one
//! high-frequency write path the Job Store has — intra-stage progress
//! counters written by the Chunker/Embedder (spec §4.1's "chunking/
//! embedding also expose intra-stage progress if the worker writes a
//! counter"). Workers send fire-and-forget updates over a channel; a
//! background task batches and flushes them so no worker blocks on a Job
//! Store write.

use crate::traits::JobStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub channel_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_millis(500),
            channel_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ProgressUpdate {
    submission_id: i64,
    count: i64,
}

pub struct StoreManager {
    update_tx: mpsc::Sender<ProgressUpdate>,
    shutdown_tx: Arc<RwLock<Option<oneshot::Sender<()>>>>,
    store: Arc<dyn JobStore>,
}

impl StoreManager {
    pub fn spawn(store: Arc<dyn JobStore>) -> (Self, JoinHandle<()>) {
        Self::spawn_with_config(store, ManagerConfig::default())
    }

    pub fn spawn_with_config(store: Arc<dyn JobStore>, config: ManagerConfig) -> (Self, JoinHandle<()>) {
        let (update_tx, update_rx) = mpsc::channel(config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let guardian_store = store.clone();
        let guardian_handle = tokio::spawn(async move {
            run_persistence_loop(guardian_store, update_rx, shutdown_rx, config).await;
        });

        let manager = Self {
            update_tx,
            shutdown_tx: Arc::new(RwLock::new(Some(shutdown_tx))),
            store,
        };

        (manager, guardian_handle)
    }

    /// Buffer a progress-counter update without blocking on the Job Store.
    pub async fn record_progress(&self, submission_id: i64, count: i64) -> anyhow::Result<()> {
        self.update_tx
            .send(ProgressUpdate { submission_id, count })
            .await
            .map_err(|_| anyhow::anyhow!("store manager's persistence task has stopped"))
    }

    /// Direct passthrough for operations that must be immediately
    /// consistent (claims, completions, failures never go through the
    /// write-behind path).
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub async fn shutdown(&self) {
        let mut guard = self.shutdown_tx.write().await;
        if let Some(tx) = guard.take() {
            let _ = tx.send(());
        }
    }
}

async fn run_persistence_loop(
    store: Arc<dyn JobStore>,
    mut update_rx: mpsc::Receiver<ProgressUpdate>,
    mut shutdown_rx: oneshot::Receiver<()>,
    config: ManagerConfig,
) {
    let mut buffer: Vec<ProgressUpdate> = Vec::with_capacity(config.batch_size);
    let mut flush_timer = tokio::time::interval(config.flush_interval);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        batch_size = config.batch_size,
        flush_interval_ms = config.flush_interval.as_millis(),
        "store manager persistence loop started"
    );

    loop {
        tokio::select! {
            Some(update) = update_rx.recv() => {
                buffer.push(update);
                if buffer.len() >= config.batch_size {
                    flush(&store, &mut buffer).await;
                }
            }
            _ = flush_timer.tick() => {
                if !buffer.is_empty() {
                    flush(&store, &mut buffer).await;
                }
            }
            _ = &mut shutdown_rx => {
                while let Ok(update) = update_rx.try_recv() {
                    buffer.push(update);
                }
                if !buffer.is_empty() {
                    flush(&store, &mut buffer).await;
                }
                info!("store manager persistence loop stopped");
                break;
            }
        }
    }
}

async fn flush(store: &Arc<dyn JobStore>, buffer: &mut Vec<ProgressUpdate>) {
    // Keep only the latest count per submission; intermediate values are
    // superseded and safe to drop.
    let mut latest: std::collections::HashMap<i64, i64> = std::collections::HashMap::new();
    for update in buffer.drain(..) {
        latest.insert(update.submission_id, update.count);
    }
    for (submission_id, count) in latest {
        if let Err(e) = store.set_indexed_chunk_count(submission_id, count).await {
            warn!(submission_id, error = %e, "failed to flush progress counter");
        }
    }
}
