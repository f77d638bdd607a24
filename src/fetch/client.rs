//! Collaborator traits for the concrete page fetcher (browser automation,
//! HTML parsing, selector configuration live outside this crate). The core
//! only depends on these seams; tests drive them with scripted mocks.

use crate::model::{CatalogEntry, Episode};
use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub type ClientFuture<'a, T> = BoxFuture<'a, Result<T>>;

/// Cheap per-season status signal, derivable without an episode-level fetch
/// (e.g. from a CSS class on the season selector). Absent information maps to
/// `Unknown`, never to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonHint {
    /// Every episode of the season is watched.
    Complete,
    /// Watched state unclear; an episode fetch is needed to know.
    #[default]
    Unknown,
}

/// One season as listed on a series page, before any episode fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonRef {
    pub label: String,
    pub link: String,
    pub hint: SeasonHint,
}

/// Result of loading a series page without touching any season page.
#[derive(Debug, Clone, Default)]
pub struct SeriesOverview {
    pub title: Option<String>,
    pub seasons: Vec<SeasonRef>,
}

impl SeriesOverview {
    /// Series pages without a season selector carry their episodes directly;
    /// normalize those to a single implicit season so downstream code never
    /// branches on the page shape.
    pub fn normalized(mut self, series_link: &str) -> Self {
        if self.seasons.is_empty() {
            self.seasons.push(SeasonRef {
                label: "1".to_string(),
                link: series_link.to_string(),
                hint: SeasonHint::Unknown,
            });
        }
        self
    }
}

/// One authenticated session against the external source.
///
/// Implementations are driven by a single worker at a time and may hold
/// whatever connection state they need; `close` releases it and is given a
/// bounded grace period on cancellation.
pub trait SeriesClient: Send {
    /// Performs a full login. Retried a bounded number of times by the worker.
    fn authenticate(&mut self) -> ClientFuture<'_, ()>;

    /// Checks for an authenticated marker without side effects.
    fn is_authenticated(&mut self) -> ClientFuture<'_, bool>;

    /// Lists every series the source currently knows, in source order.
    fn list_catalog(&mut self) -> ClientFuture<'_, Vec<CatalogEntry>>;

    /// Loads a series page: title plus season refs with their cheap hints.
    fn fetch_overview<'a>(&'a mut self, link: &'a str) -> ClientFuture<'a, SeriesOverview>;

    /// Loads one season page and parses its episode rows.
    fn fetch_season<'a>(&'a mut self, link: &'a str) -> ClientFuture<'a, Vec<Episode>>;

    /// Releases the underlying session resources.
    fn close(&mut self) -> ClientFuture<'_, ()>;
}

/// Creates fresh sessions. Used once per worker at startup and again by the
/// self-healing restart when a session is judged wedged.
pub trait SessionFactory: Send + Sync {
    fn create(&self, worker_id: usize) -> ClientFuture<'_, Box<dyn SeriesClient>>;
}
