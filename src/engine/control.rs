//! Out-of-band run control: a pause signal checked between catalog entries,
//! and a persisted registry of what each worker is currently holding so an
//! operator can inspect a live run from outside the process.

use crate::store::{remove_if_exists, write_json_atomic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Continue,
    Pause,
}

/// Capability for requesting a soft stop of a running scrape. Checked by
/// workers between catalog entries, never mid-series.
pub trait ControlChannel: Send + Sync {
    fn check(&self) -> ControlSignal;

    /// Acknowledges a consumed pause request so the next run starts clean.
    fn clear(&self);
}

/// Filesystem-marker control: the presence of the marker file requests a
/// pause. Lets an operator pause a run from another terminal.
#[derive(Debug)]
pub struct FileControl {
    path: PathBuf,
}

impl FileControl {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ControlChannel for FileControl {
    fn check(&self) -> ControlSignal {
        if self.path.exists() {
            ControlSignal::Pause
        } else {
            ControlSignal::Continue
        }
    }

    fn clear(&self) {
        if let Err(err) = remove_if_exists(&self.path) {
            tracing::warn!(error = %err, "failed to remove pause marker");
        }
    }
}

/// In-process control for embedders and tests.
#[derive(Debug, Default)]
pub struct ManualControl {
    paused: AtomicBool,
}

impl ManualControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

impl ControlChannel for ManualControl {
    fn check(&self) -> ControlSignal {
        if self.paused.load(Ordering::SeqCst) {
            ControlSignal::Pause
        } else {
            ControlSignal::Continue
        }
    }

    fn clear(&self) {
        self.resume();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryEntry {
    link: String,
    since: DateTime<Utc>,
}

/// Persisted map of which catalog entry each worker currently holds.
///
/// Mutations are best effort: a registry write failure never affects the
/// scrape itself. The file is removed at run end.
#[derive(Debug)]
pub struct WorkerRegistry {
    path: PathBuf,
    entries: Mutex<BTreeMap<usize, RegistryEntry>>,
}

impl WorkerRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record(&self, worker: usize, link: &str) {
        self.mutate(|entries| {
            entries.insert(
                worker,
                RegistryEntry {
                    link: link.to_owned(),
                    since: Utc::now(),
                },
            );
        });
    }

    pub fn remove(&self, worker: usize) {
        self.mutate(|entries| {
            entries.remove(&worker);
        });
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        if let Err(err) = remove_if_exists(&self.path) {
            tracing::warn!(error = %err, "failed to remove worker registry");
        }
    }

    fn mutate(&self, apply: impl FnOnce(&mut BTreeMap<usize, RegistryEntry>)) {
        let snapshot = match self.entries.lock() {
            Ok(mut entries) => {
                apply(&mut entries);
                entries.clone()
            }
            Err(_) => return,
        };
        if let Err(err) = write_json_atomic(&self.path, &snapshot) {
            tracing::warn!(error = %err, "failed to persist worker registry");
        }
    }
}
