//! Page-fetcher collaborator boundary: the object-safe [`SeriesClient`] and
//! [`SessionFactory`] traits workers drive, the cheap per-season status hint,
//! the fetch error taxonomy, and the cache-skip heuristic that decides when a
//! live episode fetch can be replaced by a cached-and-adjusted result.

pub mod client;
pub mod error;
pub mod skip;

pub use client::{ClientFuture, SeasonHint, SeasonRef, SeriesClient, SeriesOverview, SessionFactory};
pub use error::FetchError;
pub use skip::{plan_season, AssumptionState, SeasonPlan};
