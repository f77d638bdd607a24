use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches plain numbered seasons: "Staffel 1", "Season 2", "S3", "4".
/// Anything else ("Specials", "OVA", "Filme") is special content.
static REGULAR_SEASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(staffel|season|s)?\s*\d+$").expect("season pattern is valid"));

/// Classification of a season label. Regular seasons are eligible for the
/// assume-unwatched fetch shortcut; special seasons are always evaluated
/// individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonKind {
    Regular,
    Special,
}

pub fn season_kind(label: &str) -> SeasonKind {
    if REGULAR_SEASON.is_match(label.trim()) {
        SeasonKind::Regular
    } else {
        SeasonKind::Special
    }
}

/// Smallest unit of watched-state tracking. Identity within a series is
/// (season label, episode number) and is stable across fetches; `watched` is
/// the only field that changes over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub watched: bool,
}

/// Ordered container of episodes under one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    #[serde(rename = "season")]
    pub label: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub episodes: Vec<Episode>,
    #[serde(default)]
    pub watched_episodes: usize,
    #[serde(default)]
    pub total_episodes: usize,
}

impl Season {
    pub fn new(label: impl Into<String>, link: impl Into<String>, episodes: Vec<Episode>) -> Self {
        let mut season = Self {
            label: label.into(),
            link: link.into(),
            episodes,
            watched_episodes: 0,
            total_episodes: 0,
        };
        season.recount();
        season
    }

    pub fn kind(&self) -> SeasonKind {
        season_kind(&self.label)
    }

    /// Recomputes the derived counters from the episode list.
    pub fn recount(&mut self) {
        self.total_episodes = self.episodes.len();
        self.watched_episodes = self.episodes.iter().filter(|ep| ep.watched).count();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    Active,
    Unavailable,
}

impl Default for SeriesStatus {
    fn default() -> Self {
        SeriesStatus::Active
    }
}

/// Top-level tracked unit. `title` is the identity key in the persisted
/// index; `link` is the stable catalog path used for checkpointing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub watched_episodes: usize,
    #[serde(default)]
    pub total_episodes: usize,
    #[serde(default)]
    pub empty: bool,
    #[serde(default)]
    pub status: SeriesStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Series {
    pub fn new(title: impl Into<String>, link: impl Into<String>, seasons: Vec<Season>) -> Self {
        let mut series = Self {
            title: title.into(),
            link: link.into(),
            seasons,
            watched_episodes: 0,
            total_episodes: 0,
            empty: false,
            status: SeriesStatus::Active,
            added_at: None,
            updated_at: None,
        };
        series.recount();
        series
    }

    /// Recomputes all derived fields from the season/episode tree.
    pub fn recount(&mut self) {
        for season in &mut self.seasons {
            season.recount();
        }
        self.total_episodes = self.seasons.iter().map(|s| s.total_episodes).sum();
        self.watched_episodes = self.seasons.iter().map(|s| s.watched_episodes).sum();
        self.empty = self.total_episodes == 0;
    }

    pub fn season(&self, label: &str) -> Option<&Season> {
        self.seasons.iter().find(|s| s.label == label)
    }
}

/// One discovery result: a series known to the source at catalog time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub link: String,
}

impl CatalogEntry {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// Deduplicates catalog entries by link, preserving first-seen order.
pub(crate) fn dedup_catalog(entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.link.clone()))
        .collect()
}
