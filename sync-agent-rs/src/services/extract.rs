//! Unpacking pushed bundles into a target directory.
//!
//! A bundle is checked in full before anything is written: every entry must
//! be a plain relative file path that neither escapes the target nor collides
//! with a directory (on disk or elsewhere in the bundle). Only then is the
//! archive unpacked.

use crate::error::AppError;
use crate::services::target::checked_relative;
use std::collections::BTreeSet;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    /// The bundle itself is unusable
    #[error("{0}")]
    Invalid(String),

    /// The bundle is fine but could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<ExtractError> for AppError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::Invalid(msg) => AppError::BadRequest(msg),
            write @ ExtractError::Write { .. } => AppError::Internal(write.into()),
        }
    }
}

fn invalid(msg: impl Into<String>) -> ExtractError {
    ExtractError::Invalid(msg.into())
}

/// Decode a bundle body. `zstd` is the only content encoding understood.
pub fn decode(body: &[u8], content_encoding: Option<&str>) -> Result<Vec<u8>, ExtractError> {
    match content_encoding.map(str::trim) {
        None | Some("") | Some("identity") => Ok(body.to_vec()),
        Some(enc) if enc.eq_ignore_ascii_case("zstd") => zstd::decode_all(body)
            .map_err(|e| invalid(format!("Zstd decompression failed: {e}"))),
        Some(other) => Err(invalid(format!("unsupported content encoding {other:?}"))),
    }
}

/// Relative paths of the file entries in `archive`, validated against `target`.
fn plan(archive: &[u8], target: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut reader = tar::Archive::new(Cursor::new(archive));
    let mut files = Vec::new();

    let entries = reader
        .entries()
        .map_err(|e| invalid(format!("Unreadable bundle: {e}")))?;
    for entry in entries {
        let entry = entry.map_err(|e| invalid(format!("Unreadable bundle entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| invalid(format!("Unreadable bundle entry name: {e}")))?
            .to_string_lossy()
            .into_owned();

        if !entry.header().entry_type().is_file() {
            tracing::debug!(path = %path, "Skipping non-file bundle entry");
            continue;
        }
        let relative = checked_relative(&path)
            .map_err(|reason| invalid(format!("Bundle entry {path:?}: {reason}")))?;
        files.push(relative);
    }

    let names: BTreeSet<&Path> = files.iter().map(PathBuf::as_path).collect();
    for relative in &files {
        for ancestor in relative.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            if names.contains(ancestor) {
                return Err(invalid(format!(
                    "Bundle entry {} is both a file and a directory",
                    ancestor.display()
                )));
            }
            let on_disk = target.join(ancestor);
            if on_disk.symlink_metadata().is_ok_and(|m| !m.is_dir()) {
                return Err(invalid(format!(
                    "Bundle entry {} needs {} to be a directory",
                    relative.display(),
                    ancestor.display()
                )));
            }
        }
        if target.join(relative).symlink_metadata().is_ok_and(|m| m.is_dir()) {
            return Err(invalid(format!(
                "Bundle entry {} would replace a directory",
                relative.display()
            )));
        }
    }

    Ok(files)
}

/// Unpack a tar archive into `target`, creating it and any parent directories.
/// Returns the number of files written.
pub fn unpack(archive: &[u8], target: &Path) -> Result<usize, ExtractError> {
    let files = plan(archive, target)?;

    let write_err = |path: &Path, source: io::Error| ExtractError::Write {
        path: path.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(target).map_err(|e| write_err(target, e))?;

    let mut reader = tar::Archive::new(Cursor::new(archive));
    reader.set_preserve_permissions(false);
    let entries = reader.entries().map_err(|e| write_err(target, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| write_err(target, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let dest = target.join(entry.path().map_err(|e| write_err(target, e))?);
        if !entry.unpack_in(target).map_err(|e| write_err(&dest, e))? {
            return Err(invalid(format!(
                "Bundle entry {} escapes the target directory",
                dest.display()
            )));
        }
    }
    Ok(files.len())
}
