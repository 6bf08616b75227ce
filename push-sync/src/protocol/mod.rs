//! The two typed calls offered by the remote sync agent.
//!
//! The synchronization core only talks to the agent through [`RemoteAgent`];
//! how calls are framed on the wire is the business of the implementation
//! (see [`http::HttpAgent`]).

pub mod http;

use crate::manifest::Manifest;
use crate::transfer::TransferBundle;
use crate::utils::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpAgent;

/// Body of a `getDirtyFiles` call. Built once per run and consumed by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub target_dir: String,

    #[serde(rename = "files")]
    pub manifest: Manifest,

    #[serde(rename = "removeStaleFiles")]
    pub prune_stale: bool,
}

/// Acknowledgement of a `synchronize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    pub success: bool,

    /// Files the agent extracted
    #[serde(default)]
    pub files: usize,
}

#[async_trait]
pub trait RemoteAgent: Send + Sync {
    /// Compare `request.manifest` with the target and return the stale paths.
    ///
    /// With `prune_stale` set, the agent also deletes every target file the
    /// manifest does not name.
    async fn get_dirty_files(&self, request: &SyncRequest) -> Result<Vec<String>>;

    /// Extract `bundle` into `target_dir`, creating parent directories.
    async fn synchronize(&self, target_dir: &str, bundle: TransferBundle) -> Result<SyncAck>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory agents for exercising the pipeline without a network.

    use super::*;
    use crate::utils::SyncError;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Agent that keeps the target tree in memory and applies the same
    /// dirty/prune rules a real agent does.
    #[derive(Default)]
    pub struct RecordingAgent {
        remote: Mutex<BTreeMap<String, Vec<u8>>>,
        requests: Mutex<Vec<SyncRequest>>,
        bundles: Mutex<Vec<(String, TransferBundle)>>,
        scripted_dirty: Option<Vec<String>>,
        reject_bundles: bool,
        unavailable: bool,
    }

    impl RecordingAgent {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed the remote tree.
        pub fn with_remote_file(self, path: &str, content: &[u8]) -> Self {
            self.remote
                .lock()
                .unwrap()
                .insert(path.to_string(), content.to_vec());
            self
        }

        /// Always answer `getDirtyFiles` with `paths`.
        pub fn answering(mut self, paths: &[&str]) -> Self {
            self.scripted_dirty = Some(paths.iter().map(|p| p.to_string()).collect());
            self
        }

        pub fn rejecting_bundles(mut self) -> Self {
            self.reject_bundles = true;
            self
        }

        pub fn unavailable(mut self) -> Self {
            self.unavailable = true;
            self
        }

        pub fn requests(&self) -> Vec<SyncRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn bundles(&self) -> Vec<(String, TransferBundle)> {
            self.bundles.lock().unwrap().clone()
        }

        pub fn remote_paths(&self) -> Vec<String> {
            self.remote.lock().unwrap().keys().cloned().collect()
        }

        pub fn remote_file(&self, path: &str) -> Option<Vec<u8>> {
            self.remote.lock().unwrap().get(path).cloned()
        }
    }

    #[async_trait]
    impl RemoteAgent for RecordingAgent {
        async fn get_dirty_files(&self, request: &SyncRequest) -> Result<Vec<String>> {
            if self.unavailable {
                return Err(SyncError::RemoteUnavailable("connection refused".into()));
            }
            self.requests.lock().unwrap().push(request.clone());
            if let Some(scripted) = &self.scripted_dirty {
                return Ok(scripted.clone());
            }

            let mut remote = self.remote.lock().unwrap();
            if request.prune_stale {
                remote.retain(|path, _| request.manifest.contains(path));
            }

            let dirty = request
                .manifest
                .records()
                .filter(|record| {
                    remote
                        .get(&record.relative_path)
                        .map(|content| crate::manifest::digest_bytes(content) != record.digest)
                        .unwrap_or(true)
                })
                .map(|record| record.relative_path)
                .collect();
            Ok(dirty)
        }

        async fn synchronize(&self, target_dir: &str, bundle: TransferBundle) -> Result<SyncAck> {
            if self.unavailable {
                return Err(SyncError::RemoteUnavailable("connection refused".into()));
            }
            let files = bundle.len();
            {
                let mut remote = self.remote.lock().unwrap();
                for entry in bundle.entries() {
                    remote.insert(entry.relative_path.clone(), entry.content.to_vec());
                }
            }
            self.bundles
                .lock()
                .unwrap()
                .push((target_dir.to_string(), bundle));
            Ok(SyncAck {
                success: !self.reject_bundles,
                files,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{digest_bytes, FileRecord};

    #[test]
    fn test_request_wire_shape() {
        let manifest: Manifest = vec![FileRecord {
            relative_path: "a.txt".into(),
            digest: digest_bytes(b"A"),
        }]
        .into_iter()
        .collect();
        let request = SyncRequest {
            target_dir: "example.com".into(),
            manifest,
            prune_stale: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["targetDir"], "example.com");
        assert_eq!(json["removeStaleFiles"], true);
        assert_eq!(json["files"]["a.txt"], digest_bytes(b"A").to_hex());
    }

    #[test]
    fn test_ack_defaults_file_count() {
        let ack: SyncAck = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert_eq!(ack, SyncAck { success: true, files: 0 });
    }
}
