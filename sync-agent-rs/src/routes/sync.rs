use crate::error::AppError;
use crate::services::{dirty, extract};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn router(_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/getDirtyFiles", post(get_dirty_files))
        .route("/synchronize", post(synchronize))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirtyFilesRequest {
    target_dir: String,
    /// Relative path -> hex MD5
    #[serde(default)]
    files: BTreeMap<String, String>,
    #[serde(default)]
    remove_stale_files: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynchronizeQuery {
    target_dir: String,
}

#[derive(Debug, Serialize)]
struct SynchronizeResponse {
    success: bool,
    files: usize,
}

async fn get_dirty_files(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DirtyFilesRequest>,
) -> Result<Json<Vec<String>>, AppError> {
    let target = state.resolve_target(&request.target_dir)?;
    let _guard = state.lock_target(&target).await;

    tracing::debug!(
        target = %target.display(),
        files = request.files.len(),
        prune = request.remove_stale_files,
        "Computing dirty files"
    );

    let manifest = request.files;
    let prune = request.remove_stale_files;
    let task_target = target.clone();
    let dirty = tokio::task::spawn_blocking(move || {
        if prune {
            let removed = dirty::prune_stale(&task_target, &manifest)?;
            if !removed.is_empty() {
                tracing::info!("Pruned {} stale files from {}", removed.len(), task_target.display());
            }
        }
        dirty::dirty_files(&task_target, &manifest)
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))?
    .map_err(|e| match e.downcast::<std::io::Error>() {
        Ok(io) => AppError::Internal(io.into()),
        Err(other) => AppError::BadRequest(other.to_string()),
    })?;

    tracing::info!("{} dirty files for {}", dirty.len(), target.display());
    Ok(Json(dirty))
}

async fn synchronize(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SynchronizeQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SynchronizeResponse>, AppError> {
    let target = state.resolve_target(&query.target_dir)?;

    let content_encoding = headers
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let expected_files: Option<usize> = headers
        .get("x-file-count")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    tracing::debug!(target = %target.display(), size = body.len(), "Receiving bundle");

    let _guard = state.lock_target(&target).await;

    let task_target = target.clone();
    let files = tokio::task::spawn_blocking(move || {
        let archive = extract::decode(&body, content_encoding.as_deref())?;
        extract::unpack(&archive, &task_target)
    })
    .await
    .map_err(|e| anyhow::anyhow!(e))??;

    if let Some(expected) = expected_files {
        if expected != files {
            tracing::warn!("Bundle announced {} files but contained {}", expected, files);
        }
    }

    tracing::info!("Synchronized {} files into {}", files, target.display());
    Ok(Json(SynchronizeResponse {
        success: true,
        files,
    }))
}
