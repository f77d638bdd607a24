use crate::engine::{RunMode, RunOutcome, ScrapeEngine};
use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Drives one engine run and handles Ctrl-C for graceful shutdowns.
pub struct Runner {
    engine: ScrapeEngine,
}

impl Runner {
    pub fn new(engine: ScrapeEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ScrapeEngine {
        &self.engine
    }

    /// Returns a clone of the root shutdown token so external callers can
    /// integrate with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.engine.shutdown_token()
    }

    /// Runs the engine until it finishes or a Ctrl-C (SIGINT) arrives.
    ///
    /// On Ctrl-C the root token is cancelled and the run is awaited to its
    /// orderly end: workers get their grace period, the checkpoint is
    /// flushed, and the outcome reflects what was completed.
    pub async fn run_until_ctrl_c(&self, mode: RunMode) -> Result<RunOutcome> {
        let shutdown = self.engine.shutdown_token();
        let run = self.engine.run(mode);
        tokio::pin!(run);

        tokio::select! {
            outcome = &mut run => outcome,
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down run");
                shutdown.cancel();
                run.await
            }
        }
    }
}
