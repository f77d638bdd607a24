use crate::merge::diff::{diff, ChangeSet, EpisodeRef};
use crate::model::{Series, SeriesStatus};
use crate::store::IndexStore;
use anyhow::{Context, Result};
use chrono::Utc;

/// One confirmation request. Batch prompts cover a whole category; the
/// persist prompt is the last word before anything touches disk.
#[derive(Debug)]
pub enum GatePrompt<'a> {
    /// Approve applying every unwatched -> watched transition.
    Completions(&'a [EpisodeRef]),
    /// Approve applying every watched -> unwatched transition.
    Regressions(&'a [EpisodeRef]),
    /// Approve writing the merged index.
    Persist(&'a ChangeSet),
}

/// Decision seam for the merge. The CLI collaborator implements this with an
/// interactive prompt; embedders and tests script it.
pub trait ConfirmGate {
    fn confirm(&mut self, prompt: GatePrompt<'_>) -> bool;
}

/// Approves everything; for non-interactive runs.
pub struct ApproveAll;

impl ConfirmGate for ApproveAll {
    fn confirm(&mut self, _prompt: GatePrompt<'_>) -> bool {
        true
    }
}

/// Declines everything; a dry run that shows what would change.
pub struct DeclineAll;

impl ConfirmGate for DeclineAll {
    fn confirm(&mut self, _prompt: GatePrompt<'_>) -> bool {
        false
    }
}

/// Closure adapter.
pub struct GateFn<F>(pub F);

impl<F> ConfirmGate for GateFn<F>
where
    F: FnMut(GatePrompt<'_>) -> bool,
{
    fn confirm(&mut self, prompt: GatePrompt<'_>) -> bool {
        (self.0)(prompt)
    }
}

/// How a reconciliation ended.
#[derive(Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The fetch matches the index; nothing to do, nothing written.
    UpToDate,
    /// The final gate declined; the store was left untouched.
    Unchanged,
    /// The merged index was persisted. Carries what was actually applied.
    Applied { changes: ChangeSet },
}

/// Applies fetched series to the index behind confirmation gates.
///
/// The reconciler is the only writer of the index. Additions (new series, new
/// episodes) apply unconditionally; watched transitions only when their batch
/// gate approved; a declined final gate leaves the store byte-identical.
pub struct Reconciler {
    store: IndexStore,
}

impl Reconciler {
    pub fn new(store: IndexStore) -> Self {
        Self { store }
    }

    pub fn reconcile(
        &self,
        fetched: &[Series],
        gate: &mut dyn ConfirmGate,
    ) -> Result<ReconcileOutcome> {
        let mut index = self
            .store
            .load_map()
            .context("failed to load series index")?;
        let changes = diff(&index, fetched);

        if changes.is_empty() {
            tracing::info!(series = fetched.len(), "index already up to date");
            return Ok(ReconcileOutcome::UpToDate);
        }

        let apply_completions =
            changes.completions.is_empty() || gate.confirm(GatePrompt::Completions(&changes.completions));
        let apply_regressions =
            changes.regressions.is_empty() || gate.confirm(GatePrompt::Regressions(&changes.regressions));

        let mut applied = changes.clone();
        if !apply_completions {
            tracing::info!(count = applied.completions.len(), "completions declined");
            applied.completions.clear();
        }
        if !apply_regressions {
            tracing::info!(count = applied.regressions.len(), "regressions declined");
            applied.regressions.clear();
        }
        if applied.is_empty() {
            // Every proposed change sat behind a declined gate.
            return Ok(ReconcileOutcome::Unchanged);
        }

        for series in fetched {
            let merged = merge_series(
                index.get(&series.title),
                series,
                apply_completions,
                apply_regressions,
            );
            index.insert(merged.title.clone(), merged);
        }

        if !gate.confirm(GatePrompt::Persist(&applied)) {
            tracing::info!("final save declined; index untouched");
            return Ok(ReconcileOutcome::Unchanged);
        }

        let list: Vec<Series> = index.into_values().collect();
        self.store.save(&list).context("failed to save index")?;
        tracing::info!(
            new_series = applied.new_series.len(),
            new_episodes = applied.new_episodes.len(),
            completions = applied.completions.len(),
            regressions = applied.regressions.len(),
            "index reconciled"
        );
        Ok(ReconcileOutcome::Applied { changes: applied })
    }
}

/// Overlays one fetched series onto its index record. Seasons and episodes
/// known to the index but absent from the fetch are kept, never deleted.
fn merge_series(
    existing: Option<&Series>,
    fetched: &Series,
    apply_completions: bool,
    apply_regressions: bool,
) -> Series {
    let mut merged = fetched.clone();

    if let Some(prior) = existing {
        for season in &mut merged.seasons {
            let Some(prior_season) = prior.season(&season.label) else {
                continue;
            };
            for episode in &mut season.episodes {
                let Some(prior_episode) = prior_season
                    .episodes
                    .iter()
                    .find(|e| e.number == episode.number)
                else {
                    continue;
                };
                let keep_prior = (episode.watched && !prior_episode.watched && !apply_completions)
                    || (!episode.watched && prior_episode.watched && !apply_regressions);
                if keep_prior {
                    episode.watched = prior_episode.watched;
                }
            }
            // Episodes the fetch no longer lists survive the merge.
            for prior_episode in &prior_season.episodes {
                if !season.episodes.iter().any(|e| e.number == prior_episode.number) {
                    season.episodes.push(prior_episode.clone());
                }
            }
        }
        for prior_season in &prior.seasons {
            if merged.season(&prior_season.label).is_none() {
                merged.seasons.push(prior_season.clone());
            }
        }
        merged.added_at = prior.added_at.or(merged.added_at);
    }
    if merged.added_at.is_none() {
        merged.added_at = Some(Utc::now());
    }
    merged.updated_at = Some(Utc::now());

    for season in &mut merged.seasons {
        season.recount();
    }
    merged.recount();
    merged.status = SeriesStatus::Active;
    merged
}
