//! HTTP API: upload, poll, list and delete analysis jobs.
//!
//! Errors, extractor rejections and unknown routes included, are JSON
//! objects of the form `{"detail": "..."}`.

pub mod error;
pub mod handlers;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::error::FinsightError;
use crate::jobs::JobManager;

pub use error::ApiError;

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
}

pub fn router(manager: Arc<JobManager>) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/analyze-data", get(handlers::analyze_data))
        .route("/analyze", post(handlers::analyze))
        .route("/analyze-sync", post(handlers::analyze_sync))
        .route(
            "/result/{job_id}",
            get(handlers::get_result).delete(handlers::delete_result),
        )
        .route("/history", get(handlers::history))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(AppState { manager })
}

/// Serves the API on `listener` until `shutdown` resolves. In-flight
/// requests finish before this returns.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), FinsightError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("API listening on {}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(FinsightError::Server)?;
    tracing::info!("API stopped");
    Ok(())
}
