//! The "air gap" pattern: offload CPU-bound stage work (chunking,
//! normalization) to Tokio's blocking thread pool so the Scheduler's
//! reactor is never starved.

use resonance_core::error::{Result, ResonanceError};

pub async fn offload_compute<F, T>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ResonanceError::Other(anyhow::anyhow!("compute task panicked: {e}")))?
}

/// Offloads independent per-item compute in parallel using Rayon, used by
/// the Embedder to CPU-normalize batches before the network call.
pub async fn offload_parallel_compute<F, T, I>(items: Vec<I>, task: F) -> Result<Vec<T>>
where
    F: Fn(I) -> T + Send + Sync + 'static,
    T: Send + 'static,
    I: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        use rayon::prelude::*;
        items.into_par_iter().map(task).collect::<Vec<T>>()
    })
    .await
    .map_err(|e| ResonanceError::Other(anyhow::anyhow!("parallel compute task panicked: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn offload_does_not_starve_the_reactor() {
        let heartbeats = Arc::new(AtomicUsize::new(0));
        let hb = heartbeats.clone();
        let heartbeat_handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(20)).await;
                hb.fetch_add(1, Ordering::SeqCst);
            }
        });

        let result = offload_compute(|| {
            let start = std::time::Instant::now();
            let mut n = 0u64;
            while start.elapsed() < Duration::from_millis(100) {
                n = n.wrapping_add(1);
            }
            Ok(n)
        })
        .await;

        assert!(result.is_ok());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(heartbeats.load(Ordering::SeqCst) >= 3);
        heartbeat_handle.abort();
    }
}
