//! Bundle assembly and hand-off to the remote agent.
//!
//! A transfer happens in two phases: the bundle is assembled from the source
//! tree first, then the agent transport serializes and sends it in a single
//! call. There is no per-file retry; the whole bundle lands or the run fails.

pub mod bundle;
pub mod progress;
pub mod progress_stream;

pub use bundle::{BundleEntry, TransferBundle};

use crate::protocol::RemoteAgent;
use crate::utils::{blocking, Result, SyncError};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// What a transfer sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub files: usize,
    pub bytes: u64,
}

/// Send the files named by `selected_paths` (relative to `root`) to `target_dir`.
pub async fn transfer(
    agent: &dyn RemoteAgent,
    target_dir: &str,
    root: &Path,
    selected_paths: Vec<String>,
) -> Result<TransferSummary> {
    let started = Instant::now();
    let root_owned = root.to_path_buf();
    let bundle = blocking(root, move || TransferBundle::assemble(&root_owned, &selected_paths)).await?;

    let summary = TransferSummary {
        files: bundle.len(),
        bytes: bundle.total_bytes(),
    };
    info!(
        "Sending bundle of {} files ({}) to {}",
        summary.files,
        progress::format_bytes(summary.bytes),
        target_dir
    );

    let ack = agent.synchronize(target_dir, bundle).await?;
    if !ack.success {
        return Err(SyncError::RemoteProtocol(format!(
            "agent reported failure synchronizing {}",
            target_dir
        )));
    }

    let elapsed = started.elapsed();
    info!(
        "Bundle delivered in {} ({})",
        progress::format_duration(elapsed),
        progress::format_rate(summary.bytes, elapsed)
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::RecordingAgent;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_transfer_sends_only_selected_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"A").unwrap();
        fs::write(dir.path().join("b.txt"), b"B").unwrap();
        let agent = RecordingAgent::new();

        let summary = transfer(&agent, "example.com", dir.path(), vec!["b.txt".into()])
            .await
            .unwrap();

        assert_eq!(summary, TransferSummary { files: 1, bytes: 1 });
        let sent = agent.bundles();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "example.com");
        assert_eq!(sent[0].1.paths().collect::<Vec<_>>(), vec!["b.txt"]);
    }

    #[tokio::test]
    async fn test_rejected_bundle_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"A").unwrap();
        let agent = RecordingAgent::new().rejecting_bundles();

        let err = transfer(&agent, "t", dir.path(), vec!["a.txt".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteProtocol(_)));
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_sending() {
        let dir = TempDir::new().unwrap();
        let agent = RecordingAgent::new();

        let err = transfer(&agent, "t", dir.path(), vec!["gone.txt".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
        assert!(agent.bundles().is_empty());
    }
}
