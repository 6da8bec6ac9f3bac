pub mod pages;

use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

/// 构建完整的应用路由
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let body_limit = app_state.config.max_upload_size;

    Router::new()
        .route("/health", get(health_check))
        .merge(pages::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health_check() -> &'static str {
    "Notification Manager is running!"
}
