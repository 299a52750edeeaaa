/**
 * Background Tasks
 *
 * Helpers for work that runs outside any request: fire-and-forget routing
 * of change events, and the periodic maintenance jobs started by
 * `server::init`.
 */

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Run `future` on its own task without awaiting it
///
/// A panic inside the task is caught by the runtime and logged here, so it
/// never reaches whoever spawned it.
pub fn spawn_detached<F>(name: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let inner = tokio::spawn(future);
    tokio::spawn(async move {
        if let Err(e) = inner.await {
            if e.is_panic() {
                tracing::error!(task = name, "[Tasks] Detached task panicked: {}", e);
            } else {
                tracing::debug!(task = name, "[Tasks] Detached task cancelled");
            }
        }
    })
}

/// Run `job` every `period`, starting one period from now
///
/// Missed ticks are skipped rather than replayed back to back.
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(task = name, "[Tasks] Periodic task started (every {:?})", period);
        loop {
            interval.tick().await;
            let _ = spawn_detached(name, job()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spawn_detached_survives_panic() {
        let handle = spawn_detached("boom", async { panic!("resolver exploded") });
        assert!(handle.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_periodic_runs_each_period() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = spawn_periodic("count", Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(185)).await;
        handle.abort();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
