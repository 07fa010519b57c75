mod annotate;
mod capture;
mod error;
mod health;
mod labels;
mod metrics;
mod page;
mod upload;

pub use error::ApiError;

use crate::server::{SharedState, StartupFailure};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(page::index))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/api/labels", get(labels::labels))
        .route("/api/upload", post(upload::upload))
        .route("/api/capture", post(capture::capture))
        .route("/api/annotate", post(annotate::annotate_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

pub fn startup_failure_routes() -> Router<StartupFailure> {
    Router::new()
        .route("/", get(page::startup_error))
        .route("/health", get(health::unavailable))
        .route("/metrics", get(metrics::metrics_handler))
}
