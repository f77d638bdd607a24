//! One worker: owns a slice of the catalog and a scraping session, and works
//! through its assignment with pacing, backoff, and self-healing.

use crate::engine::backoff::{sleep_with_cancellation, ErrorBackoff};
use crate::engine::control::{ControlChannel, ControlSignal, WorkerRegistry};
use crate::engine::stats::RunStats;
use crate::fetch::{plan_season, AssumptionState, SeasonPlan, SeriesClient, SessionFactory};
use crate::model::{season_kind, CatalogEntry, Season, Series, SeriesStatus};
use crate::runtime::EngineConfig;
use crate::store::CheckpointStore;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Consecutive errors that trigger an immediate session health check.
const ERROR_STREAK_HEALTH_CHECK: usize = 3;

/// In-memory checkpoint with periodic durable flushes.
pub(crate) struct CheckpointState {
    store: CheckpointStore,
    links: HashSet<String>,
    flush_every: usize,
    since_flush: usize,
}

impl CheckpointState {
    pub(crate) fn new(store: CheckpointStore, links: HashSet<String>, flush_every: usize) -> Self {
        Self {
            store,
            links,
            flush_every,
            since_flush: 0,
        }
    }

    pub(crate) fn insert(&mut self, link: &str) {
        self.links.insert(link.to_owned());
        self.since_flush += 1;
        if self.since_flush >= self.flush_every {
            self.flush();
        }
    }

    pub(crate) fn flush(&mut self) {
        self.store.flush(&self.links);
        self.since_flush = 0;
    }

    pub(crate) fn clear(&self) {
        self.store.clear();
    }
}

/// State shared by all workers of one run. Mutation only happens behind the
/// contained locks and atomics.
pub(crate) struct WorkerShared {
    pub(crate) config: EngineConfig,
    pub(crate) factory: Arc<dyn SessionFactory>,
    pub(crate) auth_lock: Mutex<()>,
    /// Read-only index snapshot for cache lookups, keyed by title.
    pub(crate) index: BTreeMap<String, Series>,
    pub(crate) results: Mutex<Vec<Series>>,
    pub(crate) failed: Mutex<Vec<CatalogEntry>>,
    pub(crate) checkpoint: Mutex<CheckpointState>,
    pub(crate) stats: Arc<RunStats>,
    pub(crate) control: Arc<dyn ControlChannel>,
    pub(crate) registry: Arc<WorkerRegistry>,
    pub(crate) paused: AtomicBool,
}

pub(crate) struct Worker {
    id: usize,
    assignment: Vec<CatalogEntry>,
    shared: Arc<WorkerShared>,
    shutdown: CancellationToken,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        assignment: Vec<CatalogEntry>,
        shared: Arc<WorkerShared>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            assignment,
            shared,
            shutdown,
        }
    }

    /// Works through the assignment. Never panics; every failure ends up in
    /// the shared failed set or in a log line.
    pub(crate) async fn run(self) {
        let mut session = match self.open_session().await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(worker = self.id, error = %err, "worker aborting before start");
                self.mark_failed(&self.assignment).await;
                return;
            }
        };

        let config = &self.shared.config;
        let backoff = ErrorBackoff::new(config.backoff_base(), config.backoff_max());
        let mut streak: usize = 0;
        let mut successes: usize = 0;
        let mut abort_from: Option<usize> = None;

        let total = self.assignment.len();
        let mut idx = 0;
        while idx < total {
            if self.shutdown.is_cancelled() {
                tracing::info!(
                    worker = self.id,
                    remaining = total - idx,
                    "cancellation requested; stopping"
                );
                break;
            }
            if self.shared.control.check() == ControlSignal::Pause {
                self.shared.paused.store(true, Ordering::SeqCst);
                tracing::info!(
                    worker = self.id,
                    remaining = total - idx,
                    "pause requested; abandoning remaining entries"
                );
                break;
            }

            let entry = &self.assignment[idx];
            self.shared.registry.record(self.id, &entry.link);
            let outcome = self.process_series(&mut session, entry).await;
            self.shared.registry.remove(self.id);

            match outcome {
                Ok(series) => {
                    streak = 0;
                    successes += 1;
                    tracing::info!(
                        worker = self.id,
                        title = %series.title,
                        watched = series.watched_episodes,
                        total = series.total_episodes,
                        "series processed"
                    );
                    self.shared.results.lock().await.push(series);
                    self.shared.stats.record_success();
                    self.shared.checkpoint.lock().await.insert(&entry.link);

                    if successes % config.health_check_every() == 0 {
                        if let Err(err) = self.ensure_session_health(&mut session).await {
                            tracing::warn!(
                                worker = self.id,
                                error = %err,
                                "health check could not recover; replacing session"
                            );
                            if let Err(err) = self.restart_session(&mut session).await {
                                tracing::error!(worker = self.id, error = %err, "worker aborting");
                                abort_from = Some(idx + 1);
                                break;
                            }
                        }
                    }

                    if !sleep_with_cancellation(config.success_delay(), &self.shutdown).await {
                        break;
                    }
                }
                Err(err) => {
                    streak += 1;
                    tracing::warn!(
                        worker = self.id,
                        link = %entry.link,
                        streak,
                        error = %err,
                        "failed to process series"
                    );
                    self.shared.failed.lock().await.push(entry.clone());
                    self.shared.stats.record_failure();

                    if streak >= config.restart_threshold() {
                        if let Err(err) = self.restart_session(&mut session).await {
                            tracing::error!(worker = self.id, error = %err, "worker aborting");
                            abort_from = Some(idx + 1);
                            break;
                        }
                        streak = 0;
                    } else {
                        if streak >= ERROR_STREAK_HEALTH_CHECK {
                            if let Err(err) = self.ensure_session_health(&mut session).await {
                                tracing::warn!(
                                    worker = self.id,
                                    error = %err,
                                    "re-authentication failed during error streak"
                                );
                            }
                        }
                        if !sleep_with_cancellation(backoff.delay_for(streak as u32), &self.shutdown)
                            .await
                        {
                            break;
                        }
                    }
                }
            }

            idx += 1;
        }

        if let Some(from) = abort_from {
            if from < total {
                self.mark_failed(&self.assignment[from..]).await;
            }
        }

        self.close_session(&mut session).await;
        tracing::info!(worker = self.id, successes, "worker finished");
    }

    /// Creates and authenticates a fresh session. Authentication is serialized
    /// across workers and retried a bounded number of times.
    async fn open_session(&self) -> Result<Box<dyn SeriesClient>> {
        let config = &self.shared.config;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = async {
                let mut session = self.shared.factory.create(self.id).await?;
                let _guard = self.shared.auth_lock.lock().await;
                session.authenticate().await?;
                Ok::<_, anyhow::Error>(session)
            }
            .await;

            match result {
                Ok(session) => {
                    tracing::info!(worker = self.id, attempt, "session authenticated");
                    return Ok(session);
                }
                Err(err) if attempt < config.auth_retries() => {
                    tracing::warn!(
                        worker = self.id,
                        attempt,
                        error = %err,
                        "authentication failed; retrying"
                    );
                    if !sleep_with_cancellation(config.auth_retry_delay(), &self.shutdown).await {
                        return Err(anyhow!("cancelled while authenticating"));
                    }
                }
                Err(err) => {
                    return Err(err).context("authentication attempts exhausted");
                }
            }
        }
    }

    /// Fetches one series, consulting the index snapshot to skip season
    /// fetches where the heuristic allows it.
    async fn process_series(
        &self,
        session: &mut Box<dyn SeriesClient>,
        entry: &CatalogEntry,
    ) -> Result<Series> {
        let overview = session
            .fetch_overview(&entry.link)
            .await
            .with_context(|| format!("failed to load overview for {}", entry.link))?
            .normalized(&entry.link);

        let cached = self.shared.index.get(&entry.title);
        let allow_cached_first = self.shared.config.propagate_cached_assumption();
        let mut assumption = AssumptionState::default();
        let mut seasons = Vec::with_capacity(overview.seasons.len());

        for (pos, season_ref) in overview.seasons.iter().enumerate() {
            let kind = season_kind(&season_ref.label);
            let cached_season = cached.and_then(|series| series.season(&season_ref.label));
            let plan = plan_season(kind, season_ref.hint, cached_season, &assumption);

            let (mut season, from_cache) = match (plan, cached_season) {
                (SeasonPlan::ReuseCached { watched }, Some(prior)) => {
                    let mut season = prior.clone();
                    season.link = season_ref.link.clone();
                    for episode in &mut season.episodes {
                        episode.watched = watched;
                    }
                    self.shared.stats.record_season_skipped();
                    tracing::debug!(
                        worker = self.id,
                        season = %season_ref.label,
                        watched,
                        "season reused from cache"
                    );
                    (season, true)
                }
                // The plan only reuses when a cache exists; a miss here means
                // a live fetch regardless.
                (SeasonPlan::ReuseCached { .. }, None) | (SeasonPlan::LiveFetch { .. }, _) => {
                    let force_unwatched =
                        matches!(plan, SeasonPlan::LiveFetch { force_unwatched: true });
                    let mut episodes = session
                        .fetch_season(&season_ref.link)
                        .await
                        .with_context(|| {
                            format!("failed to fetch season {}", season_ref.link)
                        })?;
                    if force_unwatched {
                        for episode in &mut episodes {
                            episode.watched = false;
                        }
                    }
                    (
                        Season::new(&season_ref.label, &season_ref.link, episodes),
                        false,
                    )
                }
            };

            season.recount();
            if pos == 0 {
                assumption.observe_first(
                    kind,
                    season_ref.hint,
                    season.watched_episodes,
                    season.total_episodes,
                    from_cache,
                    allow_cached_first,
                );
            }
            seasons.push(season);
        }

        let title = overview.title.unwrap_or_else(|| entry.title.clone());
        let mut series = Series::new(title, entry.link.clone(), seasons);
        series.recount();
        series.status = SeriesStatus::Active;
        series.added_at = cached.and_then(|prior| prior.added_at).or_else(|| Some(Utc::now()));
        series.updated_at = Some(Utc::now());
        Ok(series)
    }

    /// Verifies the session is still authenticated, re-authenticating in
    /// place (serialized) when it is not.
    async fn ensure_session_health(&self, session: &mut Box<dyn SeriesClient>) -> Result<()> {
        let healthy = session.is_authenticated().await.unwrap_or(false);
        if healthy {
            return Ok(());
        }
        tracing::warn!(worker = self.id, "session lost authentication; re-authenticating");
        let _guard = self.shared.auth_lock.lock().await;
        session
            .authenticate()
            .await
            .context("in-place re-authentication failed")
    }

    /// Discards the current session and starts a fresh one.
    async fn restart_session(&self, session: &mut Box<dyn SeriesClient>) -> Result<()> {
        tracing::warn!(worker = self.id, "replacing session");
        self.close_session(session).await;
        *session = self.open_session().await?;
        Ok(())
    }

    /// Best-effort close with a time box. A hung close is logged as a leaked
    /// session rather than wedging the worker.
    async fn close_session(&self, session: &mut Box<dyn SeriesClient>) {
        let grace = self.shared.config.session_close_grace();
        match tokio::time::timeout(grace, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(worker = self.id, error = %err, "session close failed");
            }
            Err(_) => {
                tracing::warn!(worker = self.id, "session close timed out; leaking session");
            }
        }
    }

    async fn mark_failed(&self, entries: &[CatalogEntry]) {
        if entries.is_empty() {
            return;
        }
        let mut failed = self.shared.failed.lock().await;
        for entry in entries {
            self.shared.stats.record_failure();
            failed.push(entry.clone());
        }
    }
}
