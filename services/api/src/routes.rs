use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use survey_bridge::error::AppError;
use survey_bridge::workflows::skills_match::BatchSummary;
use tracing::{error, info};

pub(crate) fn webhook_routes() -> Router {
    Router::new()
        .route("/", get(liveness))
        .route(
            "/webhook",
            get(webhook_endpoint)
                .post(webhook_endpoint)
                .head(webhook_handshake),
        )
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn liveness() -> &'static str {
    "survey bridge is running"
}

/// Runs one batch. Per-response problems are reported inside the summary;
/// only a batch-aborting error becomes a 500.
pub(crate) async fn webhook_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<BatchSummary>, AppError> {
    info!("webhook received, starting survey batch");
    let pipeline = state.pipeline.clone();
    let summary = tokio::task::spawn_blocking(move || pipeline.run_batch())
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?
        .map_err(|err| {
            error!(error = %err, "survey batch aborted");
            AppError::from(err)
        })?;
    Ok(Json(summary))
}

/// Webhook verification handshake.
pub(crate) async fn webhook_handshake() -> StatusCode {
    StatusCode::OK
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
