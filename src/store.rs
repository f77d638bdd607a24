//! Durable artifacts: the persisted series index plus the transient run
//! records (checkpoint, failed set). Everything is stable JSON on disk so
//! runs survive interrupts and other processes can inspect progress.

pub mod checkpoint;
pub mod index;

pub use checkpoint::{CheckpointStore, FailedStore};
pub use index::IndexStore;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Reads a JSON file, mapping a missing file to the type's default.
pub(crate) fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Writes JSON via a temp file in the same directory followed by an atomic
/// rename, so readers never observe a partial write.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let mut tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))
        .context("failed to create temp file")?;
    serde_json::to_writer_pretty(&mut tmp, value).context("failed to serialize")?;
    tmp.flush().context("failed to flush temp file")?;
    tmp.persist(path)
        .with_context(|| format!("failed to persist {}", path.display()))?;
    Ok(())
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}
