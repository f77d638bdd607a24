//! Domain data model: series, seasons, and episodes, plus the catalog entries
//! produced by discovery. All derived counters (`watched_episodes`,
//! `total_episodes`, `empty`) are recomputed from the episode lists and never
//! trusted from input.

pub mod series;

pub use series::{
    season_kind, CatalogEntry, Episode, Season, SeasonKind, Series, SeriesStatus,
};
