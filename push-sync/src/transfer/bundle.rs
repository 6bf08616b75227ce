//! Transfer bundles: the ordered set of files sent in one `synchronize` call.
//!
//! Assembly reads the current on-disk content of each selected file, so a file
//! modified after the manifest was built is sent with its newer bytes.

use crate::fs::walker::from_unix_path;
use crate::utils::{Result, SyncError};
use bytes::Bytes;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{Builder, EntryType, Header};

const FILE_MODE: u32 = 0o644;

/// A single file in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub relative_path: String,
    pub content: Bytes,
}

/// Ordered `(path, content)` pairs for one transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferBundle {
    entries: Vec<BundleEntry>,
}

impl TransferBundle {
    pub fn new(entries: Vec<BundleEntry>) -> Self {
        Self { entries }
    }

    /// Read each of `paths` below `root`, preserving the given order.
    pub fn assemble(root: &Path, paths: &[String]) -> Result<Self> {
        let mut entries = Vec::with_capacity(paths.len());

        for relative_path in paths {
            let path = from_unix_path(root, relative_path);
            let content = std::fs::read(&path).map_err(|e| SyncError::io(&path, e))?;
            entries.push(BundleEntry {
                relative_path: relative_path.clone(),
                content: Bytes::from(content),
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.content.len() as u64).sum()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.relative_path.as_str())
    }

    /// Serialize as an uncompressed tar archive, one regular file per entry.
    pub fn to_tar(&self) -> io::Result<Vec<u8>> {
        let mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut builder = Builder::new(Vec::new());
        for entry in &self.entries {
            let mut header = Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(entry.content.len() as u64);
            header.set_mode(FILE_MODE);
            header.set_mtime(mtime);
            builder.append_data(&mut header, &entry.relative_path, entry.content.as_ref())?;
        }
        builder.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_assemble_reads_selected_files_in_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), b"A").unwrap();
        fs::write(dir.path().join("b.txt"), b"B").unwrap();
        fs::write(dir.path().join("sub/c.txt"), b"CC").unwrap();

        let bundle =
            TransferBundle::assemble(dir.path(), &["sub/c.txt".into(), "b.txt".into()]).unwrap();

        assert_eq!(bundle.paths().collect::<Vec<_>>(), vec!["sub/c.txt", "b.txt"]);
        assert_eq!(bundle.total_bytes(), 3);
        assert_eq!(bundle.entries()[0].content, Bytes::from_static(b"CC"));
    }

    #[test]
    fn test_assemble_uses_current_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"old").unwrap();
        fs::write(dir.path().join("a.txt"), b"new").unwrap();

        let bundle = TransferBundle::assemble(dir.path(), &["a.txt".into()]).unwrap();
        assert_eq!(bundle.entries()[0].content, Bytes::from_static(b"new"));
    }

    #[test]
    fn test_assemble_fails_on_vanished_file() {
        let dir = TempDir::new().unwrap();
        let err = TransferBundle::assemble(dir.path(), &["gone.txt".into()]).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn test_tar_contains_every_entry() {
        let bundle = TransferBundle::new(vec![
            BundleEntry { relative_path: "a.txt".into(), content: Bytes::from_static(b"A") },
            BundleEntry { relative_path: "deep/dir/b.txt".into(), content: Bytes::from_static(b"BB") },
        ]);

        let tar_bytes = bundle.to_tar().unwrap();
        let mut archive = tar::Archive::new(tar_bytes.as_slice());
        let mut seen = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().replace('\\', "/");
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            seen.push((path, content));
        }

        assert_eq!(
            seen,
            vec![
                ("a.txt".to_string(), b"A".to_vec()),
                ("deep/dir/b.txt".to_string(), b"BB".to_vec()),
            ]
        );
    }
}
