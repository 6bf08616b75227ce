//! HTTP transport for the remote agent.
//!
//! Each typed call is a POST to `{base_url}{method}`:
//! - `getDirtyFiles` carries the JSON [`SyncRequest`] and answers with a JSON
//!   array of paths.
//! - `synchronize` streams the bundle as a zstd-compressed tar archive and
//!   answers with a JSON [`SyncAck`].

use super::{RemoteAgent, SyncAck, SyncRequest};
use crate::config::RemoteConfig;
use crate::transfer::progress::format_bytes;
use crate::transfer::progress_stream::{ProgressCallback, ProgressStream};
use crate::transfer::TransferBundle;
use crate::utils::{Result, SyncError};
use async_compression::tokio::bufread::ZstdEncoder;
use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Response;
use serde::Deserialize;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::io::ReaderStream;
use tracing::debug;

const GET_DIRTY_FILES: &str = "getDirtyFiles";
const SYNCHRONIZE: &str = "synchronize";
const FILE_COUNT_HEADER: &str = "x-file-count";

/// Error body returned by the agent on failure.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`RemoteAgent`] reached over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpAgent {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgent {
    pub fn new(remote: &RemoteConfig) -> Result<Self> {
        let base_url = remote.base_url()?;
        let client = reqwest::Client::builder()
            .timeout(remote.timeout())
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}{}", self.base_url, method)
    }
}

#[async_trait]
impl RemoteAgent for HttpAgent {
    async fn get_dirty_files(&self, request: &SyncRequest) -> Result<Vec<String>> {
        let url = self.endpoint(GET_DIRTY_FILES);
        debug!(
            url = %url,
            files = request.manifest.len(),
            prune_stale = request.prune_stale,
            "Requesting dirty files"
        );

        let resp = self.client.post(&url).json(request).send().await?;
        let resp = check_status(resp, GET_DIRTY_FILES).await?;
        let body = resp.bytes().await?;

        Ok(serde_json::from_slice(&body)?)
    }

    async fn synchronize(&self, target_dir: &str, bundle: TransferBundle) -> Result<SyncAck> {
        let url = self.endpoint(SYNCHRONIZE);
        let file_count = bundle.len();
        let archive = bundle.to_tar().map_err(|e| SyncError::io(target_dir, e))?;
        debug!(url = %url, files = file_count, archive = %format_bytes(archive.len() as u64), "Uploading bundle");

        let target = target_dir.to_string();
        let progress: ProgressCallback = Arc::new(move |bytes| {
            debug!(target_dir = %target, sent = %format_bytes(bytes), "Bundle upload progress");
        });

        let compressed = ZstdEncoder::new(BufReader::new(Cursor::new(archive)));
        let stream = ProgressStream::new(ReaderStream::new(compressed), progress);

        let resp = self
            .client
            .post(&url)
            .query(&[("targetDir", target_dir)])
            .header(FILE_COUNT_HEADER, file_count.to_string())
            .header(CONTENT_TYPE, "application/x-tar")
            .header(CONTENT_ENCODING, "zstd")
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await?;
        let resp = check_status(resp, SYNCHRONIZE).await?;
        let body = resp.bytes().await?;

        Ok(serde_json::from_slice(&body)?)
    }
}

/// Map non-success statuses onto the error taxonomy: 5xx means the agent could
/// not serve the call, anything else means the call itself was refused.
async fn check_status(resp: Response, call: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    let detail = format!("{} returned {}: {}", call, status, message.trim());

    if status.is_server_error() {
        Err(SyncError::RemoteUnavailable(detail))
    } else {
        Err(SyncError::RemoteProtocol(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{digest_bytes, FileRecord, Manifest};
    use crate::transfer::BundleEntry;
    use axum::body::Bytes as AxumBytes;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::io::Read;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn agent_at(addr: SocketAddr) -> HttpAgent {
        HttpAgent::new(&RemoteConfig {
            host: Some(addr.ip().to_string()),
            port: addr.port(),
            timeout_secs: 10,
            ..RemoteConfig::default()
        })
        .unwrap()
    }

    fn request() -> SyncRequest {
        let manifest: Manifest = vec![
            FileRecord { relative_path: "a.txt".into(), digest: digest_bytes(b"A") },
            FileRecord { relative_path: "b.txt".into(), digest: digest_bytes(b"B") },
        ]
        .into_iter()
        .collect();
        SyncRequest {
            target_dir: "example.com".into(),
            manifest,
            prune_stale: false,
        }
    }

    #[tokio::test]
    async fn test_get_dirty_files_round_trip() {
        let router = Router::new().route(
            "/server/getDirtyFiles",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["targetDir"], "example.com");
                assert_eq!(body["removeStaleFiles"], false);
                assert!(body["files"]["a.txt"].is_string());
                Json(vec!["b.txt".to_string()])
            }),
        );
        let agent = agent_at(serve(router).await);

        let dirty = agent.get_dirty_files(&request()).await.unwrap();
        assert_eq!(dirty, vec!["b.txt"]);
    }

    #[tokio::test]
    async fn test_unknown_route_is_protocol_error() {
        let agent = agent_at(serve(Router::new()).await);

        let err = agent.get_dirty_files(&request()).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteProtocol(_)), "{err}");
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable_with_message() {
        let router = Router::new().route(
            "/server/getDirtyFiles",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "disk full" })),
                )
            }),
        );
        let agent = agent_at(serve(router).await);

        let err = agent.get_dirty_files(&request()).await.unwrap_err();
        match err {
            SyncError::RemoteUnavailable(msg) => assert!(msg.contains("disk full")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_response_is_protocol_error() {
        let router = Router::new().route(
            "/server/getDirtyFiles",
            post(|| async { Json(serde_json::json!({ "dirty": "b.txt" })) }),
        );
        let agent = agent_at(serve(router).await);

        let err = agent.get_dirty_files(&request()).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteProtocol(_)), "{err}");
    }

    #[tokio::test]
    async fn test_unreachable_agent_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = agent_at(addr).get_dirty_files(&request()).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteUnavailable(_)), "{err}");
    }

    type Received = Arc<Mutex<Vec<(String, String, Vec<u8>)>>>;

    async fn receive_bundle(
        State(received): State<Received>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        body: AxumBytes,
    ) -> Json<serde_json::Value> {
        assert_eq!(headers.get("content-encoding").unwrap(), "zstd");
        let count: usize = headers
            .get(FILE_COUNT_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();

        let tar_bytes = zstd::decode_all(body.as_ref()).unwrap();
        let mut archive = tar::Archive::new(tar_bytes.as_slice());
        let mut received = received.lock().unwrap();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().to_string();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            received.push((query["targetDir"].clone(), path, content));
        }

        Json(serde_json::json!({ "success": true, "files": count }))
    }

    #[tokio::test]
    async fn test_synchronize_streams_compressed_tar() {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .route("/server/synchronize", post(receive_bundle))
            .with_state(Arc::clone(&received));
        let agent = agent_at(serve(router).await);

        let bundle = TransferBundle::new(vec![
            BundleEntry { relative_path: "a.txt".into(), content: Bytes::from_static(b"A") },
            BundleEntry { relative_path: "dir/b.txt".into(), content: Bytes::from_static(b"BB") },
        ]);
        let ack = agent.synchronize("example.com/site", bundle).await.unwrap();

        assert_eq!(ack, SyncAck { success: true, files: 2 });
        let received = received.lock().unwrap();
        assert_eq!(
            *received,
            vec![
                ("example.com/site".to_string(), "a.txt".to_string(), b"A".to_vec()),
                ("example.com/site".to_string(), "dir/b.txt".to_string(), b"BB".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_synchronize_status_mapping() {
        let router = Router::new()
            .route(
                "/broken/synchronize",
                post(|_body: AxumBytes| async {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(serde_json::json!({ "error": "document root missing" })),
                    )
                }),
            )
            .route(
                "/strict/synchronize",
                post(|_body: AxumBytes| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(serde_json::json!({ "error": "unreadable bundle" })),
                    )
                }),
            )
            .route(
                "/garbled/synchronize",
                post(|_body: AxumBytes| async { "not json" }),
            );
        let addr = serve(router).await;
        let agent = |context: &str| {
            HttpAgent::new(&RemoteConfig {
                host: Some(addr.ip().to_string()),
                port: addr.port(),
                agent: context.to_string(),
                timeout_secs: 10,
                ..RemoteConfig::default()
            })
            .unwrap()
        };
        let bundle = || {
            TransferBundle::new(vec![BundleEntry {
                relative_path: "a.txt".into(),
                content: Bytes::from_static(b"A"),
            }])
        };

        match agent("broken").synchronize("site", bundle()).await.unwrap_err() {
            SyncError::RemoteUnavailable(msg) => assert!(msg.contains("document root missing")),
            other => panic!("unexpected error: {other}"),
        }
        match agent("strict").synchronize("site", bundle()).await.unwrap_err() {
            SyncError::RemoteProtocol(msg) => assert!(msg.contains("unreadable bundle")),
            other => panic!("unexpected error: {other}"),
        }
        let err = agent("garbled").synchronize("site", bundle()).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteProtocol(_)), "{err}");
    }
}
