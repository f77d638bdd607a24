//! Runtime concerns: validated engine configuration, tracing setup, and the
//! ctrl-c runner that ties a root cancellation token to the engine.

pub mod config;
pub mod runner;
pub mod telemetry;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use runner::Runner;
pub use telemetry::init_tracing;
