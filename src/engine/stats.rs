use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

/// Lightweight rolling counters for one scrape run.
#[derive(Debug)]
pub struct RunStats {
    total: usize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    seasons_skipped: AtomicUsize,
    started: Instant,
}

impl RunStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            seasons_skipped: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_season_skipped(&self) {
        self.seasons_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let done = succeeded + failed;
        let elapsed = self.started.elapsed();
        let eta = if done == 0 || done >= self.total {
            None
        } else {
            let per_entry = elapsed.as_secs_f64() / done as f64;
            let remaining = (self.total - done) as f64;
            Some(Duration::from_secs_f64(per_entry * remaining))
        };
        ProgressSnapshot {
            done,
            succeeded,
            failed,
            seasons_skipped: self.seasons_skipped.load(Ordering::Relaxed),
            total: self.total,
            elapsed,
            eta,
        }
    }
}

/// Point-in-time view of run progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub done: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub seasons_skipped: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub eta: Option<Duration>,
}

/// Spawns a background task that periodically logs run progress until the
/// token fires.
pub fn spawn_progress_reporter(
    stats: Arc<RunStats>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so the first log carries data.
        ticker.tick().await;

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    let snapshot = stats.snapshot();
                    tracing::info!(
                        target: "watchdex::progress",
                        done = snapshot.done,
                        failed = snapshot.failed,
                        total = snapshot.total,
                        seasons_skipped = snapshot.seasons_skipped,
                        elapsed_secs = snapshot.elapsed.as_secs(),
                        eta_secs = snapshot.eta.map(|eta| eta.as_secs()),
                        "run progress"
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = RunStats::new(10);
        stats.record_success();
        stats.record_success();
        stats.record_failure();
        stats.record_season_skipped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.done, 3);
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.seasons_skipped, 1);
        assert_eq!(snapshot.total, 10);
        assert!(snapshot.eta.is_some());
    }

    #[test]
    fn eta_is_absent_before_any_result_and_after_completion() {
        let stats = RunStats::new(2);
        assert!(stats.snapshot().eta.is_none());

        stats.record_success();
        stats.record_success();
        assert!(stats.snapshot().eta.is_none());
    }

    #[tokio::test]
    async fn progress_reporter_stops_on_cancellation() {
        let stats = Arc::new(RunStats::new(5));
        let shutdown = CancellationToken::new();
        let handle =
            spawn_progress_reporter(stats, shutdown.clone(), Duration::from_millis(10));

        shutdown.cancel();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter should stop promptly")
            .expect("task should not panic");
    }
}
