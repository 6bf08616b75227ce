//! Dirty-set negotiation with the remote agent.
//!
//! One `getDirtyFiles` round trip per run. The answer must name only paths
//! from the submitted manifest; anything else is treated as a protocol
//! violation and aborts the run instead of being silently dropped.

use crate::protocol::{RemoteAgent, SyncRequest};
use crate::utils::{Result, SyncError};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Paths the agent reported as missing or out of date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyFileSet {
    paths: BTreeSet<String>,
}

impl DirtyFileSet {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.paths.contains(relative_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Paths in ascending order.
    pub fn into_paths(self) -> Vec<String> {
        self.paths.into_iter().collect()
    }
}

/// Send `request` to the agent and validate the returned dirty set.
pub async fn negotiate(agent: &dyn RemoteAgent, request: SyncRequest) -> Result<DirtyFileSet> {
    if request.prune_stale {
        warn!(
            "Stale file removal requested: files under {} not present locally will be deleted",
            request.target_dir
        );
    }

    let reported = agent.get_dirty_files(&request).await?;
    debug!("Agent reported {} dirty paths", reported.len());

    let mut paths = BTreeSet::new();
    for path in reported {
        if !request.manifest.contains(&path) {
            return Err(SyncError::RemoteProtocol(format!(
                "agent reported dirty path '{}' that is not in the submitted manifest",
                path
            )));
        }
        paths.insert(path);
    }

    info!(
        "{} of {} files need updating on {}",
        paths.len(),
        request.manifest.len(),
        request.target_dir
    );
    Ok(DirtyFileSet { paths })
}
