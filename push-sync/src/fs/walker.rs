//! Depth-first directory traversal producing root-relative file paths.
//!
//! Entries inside each directory are visited in lexical file-name order so the
//! sequence is identical across runs and platforms. Only files are yielded;
//! relative paths always use `/` as separator.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source directory does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Source directory is in fact a file: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file discovered under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Full path to the file
    pub path: PathBuf,

    /// Root-relative path with `/` separators
    pub relative_path: String,

    /// File size in bytes at discovery time
    pub size: u64,
}

/// Enumerates the files below a root directory.
///
/// The scanner is restartable: every call to [`DirectoryScanner::files`]
/// starts a fresh walk of the tree.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    root: PathBuf,
}

impl DirectoryScanner {
    /// Create a scanner, checking that `root` exists and is a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ScanError> {
        let root = root.into();
        let metadata = match std::fs::metadata(&root) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanError::NotFound(root));
            }
            Err(source) => return Err(ScanError::Walk { path: root, source }),
        };
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree.
    pub fn files(&self) -> Scan<'_> {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Scan {
            root: &self.root,
            walker,
        }
    }
}

/// Iterator over the files of one walk.
pub struct Scan<'a> {
    root: &'a Path,
    walker: walkdir::IntoIter,
}

impl Iterator for Scan<'_> {
    type Item = Result<ScannedFile, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.to_path_buf());
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
                    return Some(Err(ScanError::Walk { path, source }));
                }
            };

            match scanned_file(&entry, self.root) {
                Ok(Some(file)) => return Some(Ok(file)),
                Ok(None) => continue,
                Err(source) => {
                    return Some(Err(ScanError::Walk {
                        path: entry.path().to_path_buf(),
                        source,
                    }));
                }
            }
        }
    }
}

/// Resolve a walk entry into a file record.
/// Directories, symlinks to directories and broken symlinks yield `None`.
fn scanned_file(entry: &DirEntry, root: &Path) -> std::io::Result<Option<ScannedFile>> {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        return Ok(None);
    }

    let size = if file_type.is_symlink() {
        match std::fs::metadata(entry.path()) {
            Ok(resolved) if resolved.is_file() => resolved.len(),
            _ => return Ok(None),
        }
    } else if file_type.is_file() {
        entry.metadata()?.len()
    } else {
        // sockets, fifos, devices
        return Ok(None);
    };

    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    Ok(Some(ScannedFile {
        path: entry.path().to_path_buf(),
        relative_path: to_unix_path(relative)?,
        size,
    }))
}

/// Join the normal components of `path` with `/`.
///
/// Names that are not valid UTF-8 are an `InvalidData` error: a lossy
/// conversion could map two files onto one key.
pub fn to_unix_path(path: &Path) -> std::io::Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            let part = part.to_str().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("file name is not valid UTF-8: {}", part.to_string_lossy()),
                )
            })?;
            parts.push(part);
        }
    }
    Ok(parts.join("/"))
}

/// Turn a `/`-separated relative path back into a native path under `root`.
pub fn from_unix_path(root: &Path, relative_path: &str) -> PathBuf {
    relative_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}
