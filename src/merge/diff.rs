use crate::model::Series;
use std::collections::BTreeMap;

/// Address of one episode across the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRef {
    pub series: String,
    pub season: String,
    pub episode: String,
}

impl EpisodeRef {
    fn new(series: &str, season: &str, episode: &str) -> Self {
        Self {
            series: series.to_owned(),
            season: season.to_owned(),
            episode: episode.to_owned(),
        }
    }
}

/// What a fetch would change in the index, split by how it is gated:
/// additions apply unconditionally, watched transitions per-batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Titles present in the fetch but not in the index.
    pub new_series: Vec<String>,
    /// Episodes of known series that the index has never seen.
    pub new_episodes: Vec<EpisodeRef>,
    /// Episodes transitioning unwatched -> watched.
    pub completions: Vec<EpisodeRef>,
    /// Episodes transitioning watched -> unwatched.
    pub regressions: Vec<EpisodeRef>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.new_series.is_empty()
            && self.new_episodes.is_empty()
            && self.completions.is_empty()
            && self.regressions.is_empty()
    }
}

/// Compares fetched series against the index, keyed by title and
/// (season label, episode number). Pure; neither side is modified.
pub fn diff(index: &BTreeMap<String, Series>, fetched: &[Series]) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for series in fetched {
        let Some(known) = index.get(&series.title) else {
            changes.new_series.push(series.title.clone());
            continue;
        };

        for season in &series.seasons {
            let known_season = known.season(&season.label);
            for episode in &season.episodes {
                let known_episode = known_season
                    .and_then(|s| s.episodes.iter().find(|e| e.number == episode.number));
                match known_episode {
                    None => {
                        changes.new_episodes.push(EpisodeRef::new(
                            &series.title,
                            &season.label,
                            &episode.number,
                        ));
                    }
                    Some(prior) if !prior.watched && episode.watched => {
                        changes.completions.push(EpisodeRef::new(
                            &series.title,
                            &season.label,
                            &episode.number,
                        ));
                    }
                    Some(prior) if prior.watched && !episode.watched => {
                        changes.regressions.push(EpisodeRef::new(
                            &series.title,
                            &season.label,
                            &episode.number,
                        ));
                    }
                    Some(_) => {}
                }
            }
        }
    }

    changes
}
