//! Mapping client-supplied names onto the local filesystem.

use crate::error::AppError;
use std::path::{Component, Path, PathBuf};

/// Resolve `target_dir` under `doc_root`. Only plain relative components are accepted.
pub fn resolve(doc_root: &Path, target_dir: &str) -> Result<PathBuf, AppError> {
    let trimmed = target_dir.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("targetDir is required".into()));
    }
    let relative = checked_relative(trimmed)
        .map_err(|reason| AppError::BadRequest(format!("Invalid targetDir {trimmed:?}: {reason}")))?;
    Ok(doc_root.join(relative))
}

/// A `/`-separated relative path made only of normal components.
pub fn checked_relative(path: &str) -> Result<PathBuf, &'static str> {
    if path.starts_with('/') || path.starts_with('\\') {
        return Err("absolute paths are not allowed");
    }
    let mut out = PathBuf::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        match Path::new(part).components().next() {
            Some(Component::Normal(_)) if Path::new(part).components().count() == 1 => {
                out.push(part)
            }
            Some(Component::ParentDir) => return Err("parent directory components are not allowed"),
            Some(Component::CurDir) => continue,
            _ => return Err("unsupported path component"),
        }
    }
    if out.as_os_str().is_empty() {
        return Err("empty path");
    }
    Ok(out)
}

/// `/`-separated form of a path relative to `root`.
pub fn to_unix_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
