pub mod health;
pub mod sync;

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::Uri;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    let sync_routes = sync::router(state.clone());
    let context = state.config.context().to_string();

    let router = Router::new().route("/health", get(health::health));
    let router = if context.is_empty() {
        router.merge(sync_routes)
    } else {
        router.nest(&format!("/{context}"), sync_routes)
    };

    router
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
