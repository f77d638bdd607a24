//! The concurrent scrape engine: catalog partitioning, worker lifecycle,
//! error backoff, pause/cancel control, run statistics, and the pool
//! orchestration that ties them together.

pub mod backoff;
pub mod control;
pub mod partition;
pub mod pool;
pub mod stats;
pub mod worker;


pub use control::{ControlChannel, ControlSignal, FileControl, ManualControl, WorkerRegistry};
pub use pool::{EngineStores, RunMode, RunOutcome, ScrapeEngine};
pub use stats::{ProgressSnapshot, RunStats};
