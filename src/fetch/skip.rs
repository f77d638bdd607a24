//! Cache-skip heuristic: decides, per season, whether a live episode fetch
//! can be replaced by a cached-and-adjusted result.
//!
//! The hint alone is never enough to fabricate episodes; a skip only happens
//! when a cached episode list exists to reuse. On large unwatched catalogs
//! the assumption propagation additionally skips the hint check for regular
//! seasons after the first season proves fully unwatched; special seasons
//! (OVA, movies, extras) are always evaluated individually.

use crate::fetch::client::SeasonHint;
use crate::model::{Season, SeasonKind};

/// How to obtain one season's episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonPlan {
    /// Reuse the cached episode list, forcing every episode to `watched`.
    ReuseCached { watched: bool },
    /// Fetch the season page. `force_unwatched` marks every episode
    /// unwatched afterwards (the assumption told us the answer, the fetch
    /// only supplies the episode list).
    LiveFetch { force_unwatched: bool },
}

/// Per-series assume-unwatched state, armed at most once per series after its
/// first season.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumptionState {
    armed: bool,
}

impl AssumptionState {
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Observes the outcome of the first processed season. Arms the
    /// assumption when that season is regular, its hint was unknown, and it
    /// turned out fully unwatched with a nonempty episode list.
    ///
    /// `from_cache` reports whether the first season itself was satisfied
    /// from cache; `allow_cached_first` is the policy switch for arming off
    /// such a result rather than off a live fetch.
    pub fn observe_first(
        &mut self,
        kind: SeasonKind,
        hint: SeasonHint,
        watched: usize,
        total: usize,
        from_cache: bool,
        allow_cached_first: bool,
    ) {
        if from_cache && !allow_cached_first {
            return;
        }
        if kind == SeasonKind::Regular && hint == SeasonHint::Unknown && watched == 0 && total > 0 {
            self.armed = true;
        }
    }
}

/// Decides how to obtain one season's episodes given its cheap hint, the
/// cached prior version (if any), and the assumption state.
pub fn plan_season(
    kind: SeasonKind,
    hint: SeasonHint,
    cached: Option<&Season>,
    assumption: &AssumptionState,
) -> SeasonPlan {
    let cached_episodes = cached.filter(|season| !season.episodes.is_empty());

    if assumption.is_armed() && kind == SeasonKind::Regular && hint == SeasonHint::Unknown {
        return match cached_episodes {
            Some(_) => SeasonPlan::ReuseCached { watched: false },
            None => SeasonPlan::LiveFetch {
                force_unwatched: true,
            },
        };
    }

    match (hint, cached_episodes) {
        (SeasonHint::Complete, Some(_)) => SeasonPlan::ReuseCached { watched: true },
        (SeasonHint::Unknown, Some(season)) if season.watched_episodes == 0 => {
            SeasonPlan::ReuseCached { watched: false }
        }
        _ => SeasonPlan::LiveFetch {
            force_unwatched: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Episode;

    fn cached_season(watched: usize, total: usize) -> Season {
        let episodes = (0..total)
            .map(|i| Episode {
                number: format!("{}", i + 1),
                title: String::new(),
                watched: i < watched,
            })
            .collect();
        Season::new("Staffel 2", "/serie/x/2", episodes)
    }

    #[test]
    fn complete_hint_with_cache_reuses_as_watched() {
        let cached = cached_season(1, 5);
        let plan = plan_season(
            SeasonKind::Regular,
            SeasonHint::Complete,
            Some(&cached),
            &AssumptionState::default(),
        );
        assert_eq!(plan, SeasonPlan::ReuseCached { watched: true });
    }

    #[test]
    fn complete_hint_without_cache_requires_live_fetch() {
        // Never fabricate episodes off a hint alone.
        let plan = plan_season(
            SeasonKind::Regular,
            SeasonHint::Complete,
            None,
            &AssumptionState::default(),
        );
        assert_eq!(
            plan,
            SeasonPlan::LiveFetch {
                force_unwatched: false
            }
        );
    }

    #[test]
    fn unknown_hint_with_unwatched_cache_reuses_as_unwatched() {
        let cached = cached_season(0, 5);
        let plan = plan_season(
            SeasonKind::Regular,
            SeasonHint::Unknown,
            Some(&cached),
            &AssumptionState::default(),
        );
        assert_eq!(plan, SeasonPlan::ReuseCached { watched: false });
    }

    #[test]
    fn unknown_hint_with_partially_watched_cache_fetches_live() {
        let cached = cached_season(2, 5);
        let plan = plan_season(
            SeasonKind::Regular,
            SeasonHint::Unknown,
            Some(&cached),
            &AssumptionState::default(),
        );
        assert_eq!(
            plan,
            SeasonPlan::LiveFetch {
                force_unwatched: false
            }
        );
    }

    #[test]
    fn cached_season_with_no_episodes_counts_as_no_cache() {
        let cached = cached_season(0, 0);
        let plan = plan_season(
            SeasonKind::Regular,
            SeasonHint::Unknown,
            Some(&cached),
            &AssumptionState::default(),
        );
        assert_eq!(
            plan,
            SeasonPlan::LiveFetch {
                force_unwatched: false
            }
        );
    }

    #[test]
    fn armed_assumption_skips_regular_seasons() {
        let mut assumption = AssumptionState::default();
        assumption.observe_first(SeasonKind::Regular, SeasonHint::Unknown, 0, 10, false, true);
        assert!(assumption.is_armed());

        // Cached regular season: reused without a fetch.
        let cached = cached_season(0, 5);
        let plan = plan_season(
            SeasonKind::Regular,
            SeasonHint::Unknown,
            Some(&cached),
            &assumption,
        );
        assert_eq!(plan, SeasonPlan::ReuseCached { watched: false });

        // No cache: still needs a fetch to learn the episode list, but the
        // result is forced unwatched.
        let plan = plan_season(SeasonKind::Regular, SeasonHint::Unknown, None, &assumption);
        assert_eq!(
            plan,
            SeasonPlan::LiveFetch {
                force_unwatched: true
            }
        );
    }

    #[test]
    fn armed_assumption_never_applies_to_special_seasons() {
        let mut assumption = AssumptionState::default();
        assumption.observe_first(SeasonKind::Regular, SeasonHint::Unknown, 0, 10, false, true);

        let cached = cached_season(0, 3);
        let plan = plan_season(
            SeasonKind::Special,
            SeasonHint::Unknown,
            Some(&cached),
            &assumption,
        );
        // Falls through to the base rules (here: unwatched cache reuse), not
        // the assumption branch; with a partially watched cache it would
        // live-fetch.
        assert_eq!(plan, SeasonPlan::ReuseCached { watched: false });

        let watched_cache = cached_season(1, 3);
        let plan = plan_season(
            SeasonKind::Special,
            SeasonHint::Unknown,
            Some(&watched_cache),
            &assumption,
        );
        assert_eq!(
            plan,
            SeasonPlan::LiveFetch {
                force_unwatched: false
            }
        );
    }

    #[test]
    fn assumption_not_armed_by_special_watched_or_empty_first_seasons() {
        let mut assumption = AssumptionState::default();
        assumption.observe_first(SeasonKind::Special, SeasonHint::Unknown, 0, 10, false, true);
        assert!(!assumption.is_armed());

        assumption.observe_first(SeasonKind::Regular, SeasonHint::Complete, 0, 10, false, true);
        assert!(!assumption.is_armed());

        assumption.observe_first(SeasonKind::Regular, SeasonHint::Unknown, 1, 10, false, true);
        assert!(!assumption.is_armed());

        assumption.observe_first(SeasonKind::Regular, SeasonHint::Unknown, 0, 0, false, true);
        assert!(!assumption.is_armed());
    }

    #[test]
    fn cached_first_season_arms_only_when_policy_allows() {
        let mut strict = AssumptionState::default();
        strict.observe_first(SeasonKind::Regular, SeasonHint::Unknown, 0, 10, true, false);
        assert!(!strict.is_armed());

        let mut lenient = AssumptionState::default();
        lenient.observe_first(SeasonKind::Regular, SeasonHint::Unknown, 0, 10, true, true);
        assert!(lenient.is_armed());
    }
}
