use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::vector_index::{IndexEntry, IndexManifest, VectorIndex};
use crate::utils::error::IndexError;

const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_FILE: &str = "entries.json";

/// On-disk home of the vector index: `manifest.json` (version + parameters)
/// and `entries.json` (chunks with their vectors).
///
/// The manifest is written last and removed first, so a directory with a
/// manifest always holds a complete entry set.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load a persisted index that matches `expected`, or explain why not.
    pub fn load(&self, expected: &IndexManifest) -> Result<VectorIndex, IndexError> {
        let manifest_path = self.dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(IndexError::Missing(manifest_path));
        }

        let manifest: IndexManifest = read_json(&manifest_path)?;
        if let Some(reason) = manifest.incompatibility(expected) {
            return Err(IndexError::Incompatible(reason));
        }

        let entries: Vec<IndexEntry> = read_json(&self.dir.join(ENTRIES_FILE))?;
        let index = VectorIndex::from_parts(manifest, entries)?;

        info!("Loaded persisted index from {:?} ({} entries)", self.dir, index.len());
        Ok(index)
    }

    pub fn save(&self, index: &VectorIndex) -> Result<(), IndexError> {
        fs::create_dir_all(&self.dir)?;

        let manifest_path = self.dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            fs::remove_file(&manifest_path)?;
        }

        write_json_atomic(&self.dir.join(ENTRIES_FILE), &index.entries())?;
        write_json_atomic(&manifest_path, index.manifest())?;

        info!("Persisted index to {:?} ({} entries)", self.dir, index.len());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IndexError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IndexError::Missing(path.to_path_buf()),
        _ => IndexError::Io(e),
    })?;

    serde_json::from_slice(&bytes)
        .map_err(|e| IndexError::Corrupt(format!("{}: {}", path.display(), e)))
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), IndexError> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec(value)
        .map_err(|e| IndexError::Corrupt(format!("serialize {}: {}", path.display(), e)))?;

    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    debug!("Wrote {:?}", path);
    Ok(())
}
