//! HTTP status feed for the dispatcher.
//!
//! - `GET /stats`: JSON snapshot of the statistics recorder
//! - `GET /` or `GET /index.html`: static viewer that polls `/stats`

use crate::stats::StatsRecorder;
use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

const VIEWER_HTML: &str = include_str!("assets/viewer.html");

/// Build the status router
pub fn router(stats: Arc<StatsRecorder>) -> Router {
    Router::new()
        .route("/", get(viewer))
        .route("/index.html", get(viewer))
        .route("/stats", get(snapshot))
        .with_state(stats)
}

/// Serve the status feed on an already bound listener
pub async fn serve(listener: TcpListener, stats: Arc<StatsRecorder>) -> std::io::Result<()> {
    info!(address = %listener.local_addr()?, "Status feed listening");
    axum::serve(listener, router(stats)).await
}

async fn viewer() -> Html<&'static str> {
    Html(VIEWER_HTML)
}

async fn snapshot(State(stats): State<Arc<StatsRecorder>>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(stats.snapshot()),
    )
}
