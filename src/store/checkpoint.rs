use crate::model::CatalogEntry;
use crate::store::{read_json_or_default, remove_if_exists, write_json_atomic};
use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;

/// Durable set of catalog links already processed in the current run.
///
/// Writes are idempotent (a set, not a log) so repeated or out-of-order
/// flushes are safe; the file is removed once a run fully completes.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<HashSet<String>> {
        let links: Vec<String> = read_json_or_default(&self.path)?;
        Ok(links.into_iter().collect())
    }

    pub fn save(&self, links: &HashSet<String>) -> Result<()> {
        let mut ordered: Vec<&String> = links.iter().collect();
        ordered.sort();
        write_json_atomic(&self.path, &ordered)
    }

    /// Best-effort flush: persistence failures cost only redone work on
    /// resume, so they are logged instead of propagated.
    pub fn flush(&self, links: &HashSet<String>) {
        if let Err(err) = self.save(links) {
            tracing::warn!(error = %err, "checkpoint flush failed; resume may redo some work");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = remove_if_exists(&self.path) {
            tracing::warn!(error = %err, "failed to clear checkpoint");
        }
    }
}

/// Durable list of catalog entries whose processing failed, kept for a later
/// isolated retry pass.
#[derive(Debug, Clone)]
pub struct FailedStore {
    path: PathBuf,
}

impl FailedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<CatalogEntry>> {
        read_json_or_default(&self.path)
    }

    /// Persists the failed set, or removes the file when the set is empty.
    pub fn save(&self, entries: &[CatalogEntry]) {
        let result = if entries.is_empty() {
            remove_if_exists(&self.path)
        } else {
            write_json_atomic(&self.path, &entries)
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to persist failed-series set");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = remove_if_exists(&self.path) {
            tracing::warn!(error = %err, "failed to clear failed-series set");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_round_trip_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CheckpointStore::new(dir.path().join("checkpoint.json"));

        assert!(store.load().expect("empty load").is_empty());

        let links: HashSet<String> = ["/serie/a", "/serie/b"]
            .into_iter()
            .map(String::from)
            .collect();
        store.save(&links).expect("save");
        assert_eq!(store.load().expect("load"), links);

        // Re-flushing the same set is a no-op semantically.
        store.flush(&links);
        assert_eq!(store.load().expect("reload"), links);

        store.clear();
        assert!(store.load().expect("cleared load").is_empty());
    }

    #[test]
    fn failed_store_empties_file_when_set_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FailedStore::new(dir.path().join("failed.json"));

        let entries = vec![CatalogEntry::new("Y", "/serie/y")];
        store.save(&entries);
        assert_eq!(store.load().expect("load"), entries);

        store.save(&[]);
        assert!(!dir.path().join("failed.json").exists());
        assert!(store.load().expect("load after clear").is_empty());
    }
}
