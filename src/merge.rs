//! Reconciliation of freshly fetched series against the persisted index:
//! change detection, confirmation gates, gated merge, atomic persist.

pub mod diff;
pub mod engine;

pub use diff::{diff, ChangeSet, EpisodeRef};
pub use engine::{
    ApproveAll, ConfirmGate, DeclineAll, GateFn, GatePrompt, ReconcileOutcome, Reconciler,
};
