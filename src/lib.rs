pub mod engine;
pub mod fetch;
pub mod merge;
pub mod model;
pub mod runtime;
pub mod store;

pub use engine::{
    ControlChannel, ControlSignal, EngineStores, FileControl, ManualControl, ProgressSnapshot,
    RunMode, RunOutcome, RunStats, ScrapeEngine, WorkerRegistry,
};
pub use fetch::{
    ClientFuture, FetchError, SeasonHint, SeasonRef, SeriesClient, SeriesOverview, SessionFactory,
};
pub use merge::{
    ApproveAll, ChangeSet, ConfirmGate, DeclineAll, EpisodeRef, GateFn, GatePrompt,
    ReconcileOutcome, Reconciler,
};
pub use model::{CatalogEntry, Episode, Season, SeasonKind, Series, SeriesStatus};
pub use runtime::config::{EngineConfig, EngineConfigBuilder, EngineConfigParams};
pub use runtime::runner::Runner;
pub use runtime::telemetry::init_tracing;
pub use store::{CheckpointStore, FailedStore, IndexStore};
