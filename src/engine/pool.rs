//! Run orchestration: derives the worklist for the requested mode, partitions
//! it across workers, runs them under the cancellation token, and finalizes
//! the durable stores.

use crate::engine::control::{ControlChannel, WorkerRegistry};
use crate::engine::partition::partition;
use crate::engine::stats::{spawn_progress_reporter, ProgressSnapshot, RunStats};
use crate::engine::worker::{CheckpointState, Worker, WorkerShared};
use crate::fetch::{SeriesClient, SessionFactory};
use crate::model::series::dedup_catalog;
use crate::model::{CatalogEntry, Series};
use crate::runtime::EngineConfig;
use crate::store::{CheckpointStore, FailedStore, IndexStore};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// What a run should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// The whole catalog.
    Full,
    /// Catalog entries not yet present in the index.
    NewOnly,
    /// Catalog entries not recorded in the checkpoint of an interrupted run.
    Resume,
    /// The persisted failed set of an earlier run.
    RetryFailed,
    /// One series, addressed by its catalog link.
    Single(String),
    /// An explicit list of catalog links.
    List(Vec<String>),
}

/// Durable artifacts one engine instance works against.
#[derive(Debug, Clone)]
pub struct EngineStores {
    pub index: IndexStore,
    pub checkpoint: CheckpointStore,
    pub failed: FailedStore,
}

/// Result of one engine run. The fetched series are handed to the reconciler;
/// the engine itself never writes the index.
#[derive(Debug)]
pub struct RunOutcome {
    pub series: Vec<Series>,
    pub stats: ProgressSnapshot,
    pub paused: bool,
}

pub struct ScrapeEngine {
    config: EngineConfig,
    factory: Arc<dyn SessionFactory>,
    stores: EngineStores,
    control: Arc<dyn ControlChannel>,
    registry: Arc<WorkerRegistry>,
    shutdown: CancellationToken,
    /// Counters of the run in flight, published so embedders can poll
    /// progress while `run` is pending.
    current_stats: std::sync::Mutex<Option<Arc<RunStats>>>,
}

impl ScrapeEngine {
    pub fn new(
        config: EngineConfig,
        factory: Arc<dyn SessionFactory>,
        stores: EngineStores,
        control: Arc<dyn ControlChannel>,
        registry: WorkerRegistry,
    ) -> Self {
        Self::with_cancellation_token(
            config,
            factory,
            stores,
            control,
            registry,
            CancellationToken::new(),
        )
    }

    pub fn with_cancellation_token(
        config: EngineConfig,
        factory: Arc<dyn SessionFactory>,
        stores: EngineStores,
        control: Arc<dyn ControlChannel>,
        registry: WorkerRegistry,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            factory,
            stores,
            control,
            registry: Arc::new(registry),
            shutdown,
            current_stats: std::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Root token for this engine; cancelling it winds the run down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Live snapshot of the run in flight (or the last finished one).
    /// `None` until the engine has started working through a worklist.
    pub fn progress(&self) -> Option<ProgressSnapshot> {
        self.current_stats
            .lock()
            .ok()
            .and_then(|current| current.as_ref().map(|stats| stats.snapshot()))
    }

    /// Executes one scrape run covering the given mode.
    pub async fn run(&self, mode: RunMode) -> Result<RunOutcome> {
        let index = self
            .stores
            .index
            .load_map()
            .context("failed to load series index")?;
        let worklist = self.build_worklist(&mode, &index).await?;

        if worklist.is_empty() {
            tracing::info!(mode = ?mode, "nothing to do");
            return Ok(RunOutcome {
                series: Vec::new(),
                stats: RunStats::new(0).snapshot(),
                paused: false,
            });
        }

        let checkpoint_links = match mode {
            // A resumed run keeps accumulating into the existing checkpoint.
            RunMode::Resume => self
                .stores
                .checkpoint
                .load()
                .context("failed to load checkpoint")?,
            _ => Default::default(),
        };

        let total = worklist.len();
        let stats = Arc::new(RunStats::new(total));
        if let Ok(mut current) = self.current_stats.lock() {
            *current = Some(Arc::clone(&stats));
        }
        let shared = Arc::new(WorkerShared {
            config: self.config.clone(),
            factory: Arc::clone(&self.factory),
            auth_lock: Mutex::new(()),
            index,
            results: Mutex::new(Vec::with_capacity(total)),
            failed: Mutex::new(Vec::new()),
            checkpoint: Mutex::new(CheckpointState::new(
                self.stores.checkpoint.clone(),
                checkpoint_links,
                self.config.checkpoint_flush_every(),
            )),
            stats: Arc::clone(&stats),
            control: Arc::clone(&self.control),
            registry: Arc::clone(&self.registry),
            paused: AtomicBool::new(false),
        });

        let assignments = partition(worklist, self.config.worker_count());
        tracing::info!(
            mode = ?mode,
            entries = total,
            workers = assignments.len(),
            "starting scrape run"
        );

        let reporter_token = self.shutdown.child_token();
        let reporter = spawn_progress_reporter(
            Arc::clone(&stats),
            reporter_token.clone(),
            self.config.progress_interval(),
        );

        let mut handles = Vec::with_capacity(assignments.len());
        for (id, assignment) in assignments.into_iter().enumerate() {
            let worker = Worker::new(id, assignment, Arc::clone(&shared), self.shutdown.clone());
            handles.push(tokio::spawn(worker.run()));
        }

        self.join_workers(handles).await;

        reporter_token.cancel();
        if let Err(err) = reporter.await {
            tracing::warn!(error = %err, "progress reporter task terminated unexpectedly");
        }

        let series = std::mem::take(&mut *shared.results.lock().await);
        let failed = std::mem::take(&mut *shared.failed.lock().await);
        let paused = shared.paused.load(Ordering::SeqCst);
        let cancelled = self.shutdown.is_cancelled();
        let fully_successful = failed.is_empty() && !paused && !cancelled;

        {
            let mut checkpoint = shared.checkpoint.lock().await;
            if fully_successful {
                checkpoint.clear();
            } else {
                checkpoint.flush();
            }
        }
        self.persist_failed(&series, failed);
        self.registry.clear();
        if paused {
            self.control.clear();
        }

        let snapshot = stats.snapshot();
        tracing::info!(
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            total = snapshot.total,
            seasons_skipped = snapshot.seasons_skipped,
            paused,
            cancelled,
            "scrape run finished"
        );

        Ok(RunOutcome {
            series,
            stats: snapshot,
            paused,
        })
    }

    async fn build_worklist(
        &self,
        mode: &RunMode,
        index: &BTreeMap<String, Series>,
    ) -> Result<Vec<CatalogEntry>> {
        if let RunMode::RetryFailed = mode {
            let entries = self
                .stores
                .failed
                .load()
                .context("failed to load failed set")?;
            return Ok(dedup_catalog(entries));
        }

        let catalog = dedup_catalog(self.list_catalog().await?);
        tracing::info!(entries = catalog.len(), "catalog listed");

        match mode {
            RunMode::Full => Ok(catalog),
            RunMode::NewOnly => Ok(catalog
                .into_iter()
                .filter(|entry| !index.contains_key(&entry.title))
                .collect()),
            RunMode::Resume => {
                let done = self
                    .stores
                    .checkpoint
                    .load()
                    .context("failed to load checkpoint")?;
                Ok(catalog
                    .into_iter()
                    .filter(|entry| !done.contains(&entry.link))
                    .collect())
            }
            RunMode::Single(link) => Ok(resolve_links(catalog, std::slice::from_ref(link))),
            RunMode::List(links) => Ok(resolve_links(catalog, links)),
            RunMode::RetryFailed => unreachable!("handled above"),
        }
    }

    /// Lists the catalog through a short-lived bootstrap session.
    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let mut session = self
            .factory
            .create(0)
            .await
            .context("failed to create bootstrap session")?;
        session
            .authenticate()
            .await
            .context("bootstrap authentication failed")?;
        let result = session.list_catalog().await.context("failed to list catalog");
        self.close_bootstrap(&mut session).await;
        result
    }

    async fn close_bootstrap(&self, session: &mut Box<dyn SeriesClient>) {
        match timeout(self.config.session_close_grace(), session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "bootstrap session close failed"),
            Err(_) => tracing::warn!("bootstrap session close timed out; leaking session"),
        }
    }

    /// Awaits workers, granting a bounded grace period once cancellation is
    /// requested and aborting stragglers past it.
    async fn join_workers(&self, handles: Vec<tokio::task::JoinHandle<()>>) {
        let grace = self.config.cancel_grace();
        for (worker, mut handle) in handles.into_iter().enumerate() {
            let joined = tokio::select! {
                result = &mut handle => Some(result),
                _ = self.shutdown.cancelled() => None,
            };

            let result = match joined {
                Some(result) => result,
                None => match timeout(grace, &mut handle).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(worker, "worker did not stop within grace period; aborting");
                        handle.abort();
                        let _ = handle.await;
                        continue;
                    }
                },
            };

            if let Err(err) = result {
                tracing::warn!(worker, error = %err, "worker task terminated unexpectedly");
            }
        }
    }

    /// Updates the persisted failed set: entries that succeeded this run are
    /// drained, fresh failures appended.
    fn persist_failed(&self, succeeded: &[Series], failures: Vec<CatalogEntry>) {
        let mut persisted = match self.stores.failed.load() {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load prior failed set; starting fresh");
                Vec::new()
            }
        };
        persisted.retain(|entry| !succeeded.iter().any(|series| series.link == entry.link));
        for failure in failures {
            if !persisted.iter().any(|entry| entry.link == failure.link) {
                persisted.push(failure);
            }
        }
        self.stores.failed.save(&persisted);
    }
}

/// Resolves requested links against the catalog, keeping catalog titles where
/// known and falling back to a synthesized entry for direct links.
fn resolve_links(catalog: Vec<CatalogEntry>, links: &[String]) -> Vec<CatalogEntry> {
    links
        .iter()
        .map(|link| {
            catalog
                .iter()
                .find(|entry| &entry.link == link)
                .cloned()
                .unwrap_or_else(|| CatalogEntry::new(link.clone(), link.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_links_prefers_catalog_titles() {
        let catalog = vec![
            CatalogEntry::new("Alpha", "/serie/alpha"),
            CatalogEntry::new("Beta", "/serie/beta"),
        ];
        let resolved = resolve_links(
            catalog,
            &["/serie/beta".to_owned(), "/serie/unknown".to_owned()],
        );
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].title, "Beta");
        assert_eq!(resolved[1].title, "/serie/unknown");
        assert_eq!(resolved[1].link, "/serie/unknown");
    }
}
