use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use blind_hire::error::AppError;
use blind_hire::workflows::matching::{
    matching_router, operator_caller, MatchingService, MatchingStore, NotificationPublisher,
};
use blind_hire::workflows::scores::{ImportSummary, VerifiedScoreImporter};
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub(crate) struct VerifiedScoreUpload {
    pub(crate) csv: String,
}

pub(crate) fn with_service_routes<S, N>(service: Arc<MatchingService<S, N>>) -> Router
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let scores = Router::new()
        .route(
            "/api/v1/competencies/verified",
            post(verified_scores_endpoint::<S, N>),
        )
        .with_state(service.clone());

    matching_router(service)
        .merge(scores)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
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

/// Applies an uploaded assessment export on behalf of an operator.
/// Rejected rows come back in `skipped`.
pub(crate) async fn verified_scores_endpoint<S, N>(
    State(service): State<Arc<MatchingService<S, N>>>,
    headers: HeaderMap,
    Json(upload): Json<VerifiedScoreUpload>,
) -> Response
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let operator = match operator_caller(&headers) {
        Ok(operator) => operator,
        Err(rejection) => return rejection,
    };
    match import_scores(&service, upload) {
        Ok(summary) => {
            info!(
                operator = %operator,
                applied = summary.applied,
                skipped = summary.skipped.len(),
                "verified scores imported"
            );
            Json(summary).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn import_scores<S, N>(
    service: &MatchingService<S, N>,
    upload: VerifiedScoreUpload,
) -> Result<ImportSummary, AppError>
where
    S: MatchingStore + 'static,
    N: NotificationPublisher + 'static,
{
    let reader = Cursor::new(upload.csv.into_bytes());
    Ok(VerifiedScoreImporter::from_reader(reader, service)?)
}
