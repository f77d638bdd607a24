use crate::model::Series;
use crate::store::{read_json_or_default, write_json_atomic};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The persisted series index: a JSON list of series records, keyed in
/// memory by title. The reconciler is the only writer; workers only read a
/// snapshot for cache lookups.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the index list; a missing file is an empty index.
    pub fn load(&self) -> Result<Vec<Series>> {
        read_json_or_default(&self.path)
    }

    /// Loads the index keyed by title. Duplicate titles keep the last record,
    /// matching the list-to-map conversion the index always used.
    pub fn load_map(&self) -> Result<BTreeMap<String, Series>> {
        let list = self.load()?;
        Ok(list
            .into_iter()
            .map(|series| (series.title.clone(), series))
            .collect())
    }

    /// Atomically rewrites the whole index. This is the reconciler's single
    /// observable side effect on approval.
    pub fn save(&self, series: &[Series]) -> Result<()> {
        write_json_atomic(&self.path, &series)?;
        tracing::info!(count = series.len(), path = %self.path.display(), "saved series index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Episode, Season};

    fn sample_series(title: &str) -> Series {
        Series::new(
            title,
            format!("/serie/{}", title.to_lowercase()),
            vec![Season::new(
                "Staffel 1",
                "/s1",
                vec![Episode {
                    number: "1".into(),
                    title: "Pilot".into(),
                    watched: true,
                }],
            )],
        )
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::new(dir.path().join("index.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::new(dir.path().join("index.json"));

        let series = vec![sample_series("Alpha"), sample_series("Beta")];
        store.save(&series).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded, series);

        let map = store.load_map().expect("load_map");
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("Alpha"));
    }

    #[test]
    fn save_replaces_previous_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::new(dir.path().join("index.json"));

        store.save(&[sample_series("Alpha")]).expect("save");
        store.save(&[sample_series("Beta")]).expect("save again");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "Beta");
    }
}
