//! Content manifest of a source tree.
//!
//! A manifest maps every admitted file's `/`-separated relative path to its
//! content digest, ordered by path so serialization is deterministic. It is
//! built fresh for each run and dropped when the run ends.

pub mod digest;

pub use digest::{digest_bytes, digest_file, Digest};

use crate::fs::{DirectoryScanner, PathFilter, ScanError, ScannedFile};
use crate::utils::{Result, SyncError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// One manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub relative_path: String,
    pub digest: Digest,
}

/// Ordered mapping from relative path to digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    files: BTreeMap<String, Digest>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: FileRecord) -> Option<Digest> {
        self.files.insert(record.relative_path, record.digest)
    }

    pub fn get(&self, relative_path: &str) -> Option<&Digest> {
        self.files.get(relative_path)
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.files.contains_key(relative_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths in ascending order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Records in ascending path order.
    pub fn records(&self) -> impl Iterator<Item = FileRecord> + '_ {
        self.files.iter().map(|(path, digest)| FileRecord {
            relative_path: path.clone(),
            digest: *digest,
        })
    }
}

impl FromIterator<FileRecord> for Manifest {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for record in iter {
            manifest.insert(record);
        }
        manifest
    }
}

impl From<ScanError> for SyncError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::NotFound(_) | ScanError::NotADirectory(_) => {
                SyncError::Configuration(e.to_string())
            }
            ScanError::Walk { path, source } => SyncError::io(path, source),
        }
    }
}

/// Files under `root` admitted by `filter`, in scan order.
fn admitted_files(root: &Path, filter: &PathFilter) -> Result<Vec<ScannedFile>> {
    let scanner = DirectoryScanner::new(root)?;
    let mut admitted = Vec::new();

    for file in scanner.files() {
        let file = file?;
        if filter.includes(&file.relative_path) {
            admitted.push(file);
        }
    }

    Ok(admitted)
}

/// Relative paths of every file a manifest of `root` would contain.
pub fn filtered_paths(root: &Path, filter: &PathFilter) -> Result<Vec<String>> {
    Ok(admitted_files(root, filter)?
        .into_iter()
        .map(|f| f.relative_path)
        .collect())
}

/// Scan `root`, apply `filter` and digest every surviving file.
///
/// Digests are computed in parallel; the path-ordered map keeps the result
/// independent of completion order. A file that cannot be read aborts the
/// whole build.
pub fn build_manifest(root: &Path, filter: &PathFilter) -> Result<Manifest> {
    let admitted = admitted_files(root, filter)?;
    debug!("Digesting {} files under {}", admitted.len(), root.display());

    let files = admitted
        .par_iter()
        .map(|file| {
            digest_file(&file.path)
                .map(|digest| (file.relative_path.clone(), digest))
                .map_err(|e| SyncError::io(&file.path, e))
        })
        .collect::<Result<BTreeMap<String, Digest>>>()?;

    Ok(Manifest { files })
}
