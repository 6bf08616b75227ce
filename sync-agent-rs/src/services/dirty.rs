//! Dirty file computation and stale file pruning on the agent side.

use crate::services::target::{checked_relative, to_unix_path};
use md5::{Digest as _, Md5};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use walkdir::WalkDir;

const BUF_SIZE: usize = 64 * 1024;

/// Lowercase hex MD5 of a file.
pub fn md5_hex(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(BUF_SIZE, File::open(path)?);
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Manifest paths whose target copy is missing or has a different digest.
///
/// Paths that cannot be mapped safely under the target are an error.
pub fn dirty_files(target: &Path, manifest: &BTreeMap<String, String>) -> anyhow::Result<Vec<String>> {
    let mut dirty = Vec::new();
    for (relative, expected) in manifest {
        let local = target.join(
            checked_relative(relative).map_err(|reason| anyhow::anyhow!("{relative:?}: {reason}"))?,
        );
        let matches = match local.symlink_metadata() {
            Ok(meta) if meta.is_file() => md5_hex(&local)?.eq_ignore_ascii_case(expected),
            Ok(_) => false,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if !matches {
            dirty.push(relative.clone());
        }
    }
    Ok(dirty)
}

/// Delete target files not named in the manifest, then any directory left empty.
/// Returns the removed file paths.
pub fn prune_stale(target: &Path, manifest: &BTreeMap<String, String>) -> io::Result<Vec<String>> {
    if !target.is_dir() {
        return Ok(Vec::new());
    }

    let keep: BTreeSet<&str> = manifest.keys().map(String::as_str).collect();
    let mut removed = Vec::new();

    for entry in WalkDir::new(target).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Some(relative) = to_unix_path(target, entry.path()) else {
            continue;
        };
        if !keep.contains(relative.as_str()) {
            std::fs::remove_file(entry.path())?;
            tracing::debug!(path = %relative, "Pruned stale file");
            removed.push(relative);
        }
    }

    // Children before parents so nested empty directories collapse
    for entry in WalkDir::new(target)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
    {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_dir() && is_empty_dir(entry.path())? {
            std::fs::remove_dir(entry.path())?;
        }
    }

    Ok(removed)
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(std::fs::read_dir(path)?.next().is_none())
}
