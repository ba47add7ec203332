//! HTTP API for submitting and inspecting jobs.
//!
//! | Method | Path                        |
//! |--------|-----------------------------|
//! | POST   | `/api/jobs`                 |
//! | GET    | `/api/jobs`                 |
//! | GET    | `/api/jobs/{id}`            |
//! | GET    | `/api/jobs/status/{status}` |
//! | GET    | `/api/jobs/stats`           |
//! | GET    | `/health`                   |
//!
//! Cross-origin requests are allowed from `JobflowConfig::cors_origins`.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::app::{App, StatsSnapshot};
use crate::domain::{JobId, JobRecord, JobSpec, JobStatus};
use crate::error::JobflowError;

/// Errors returned to HTTP clients as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<JobflowError> for ApiError {
    fn from(e: JobflowError) -> Self {
        tracing::error!(error = %e, "request failed");
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router. `App` is cheap to clone and shared by every handler.
pub fn router(app: App) -> Router {
    let cors = cors_layer(&app.config().cors_origins);
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route("/api/jobs/stats", get(stats))
        .route("/api/jobs/status/{status}", get(jobs_by_status))
        .route("/api/jobs/{id}", get(get_job))
        .with_state(app);
    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// `None` when no usable origin is configured. Origins that are not valid
/// header values are logged and skipped.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_job(
    State(app): State<App>,
    Json(spec): Json<JobSpec>,
) -> Result<Json<JobRecord>, ApiError> {
    let job = app.submitter().submit(spec).await?;
    Ok(Json(job))
}

async fn list_jobs(State(app): State<App>) -> Result<Json<Vec<JobRecord>>, ApiError> {
    Ok(Json(app.submitter().list_all().await?))
}

async fn get_job(
    State(app): State<App>,
    Path(raw): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    let not_found = || ApiError::NotFound(format!("job {raw} not found"));

    // An id that cannot be parsed cannot exist either.
    let id: JobId = raw.parse().map_err(|_| not_found())?;
    app.submitter()
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

async fn jobs_by_status(
    State(app): State<App>,
    Path(raw): Path<String>,
) -> Result<Json<Vec<JobRecord>>, ApiError> {
    let status: JobStatus = raw
        .parse()
        .map_err(|e: crate::domain::ParseJobStatusError| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(app.submitter().list_by_status(status).await?))
}

async fn stats(State(app): State<App>) -> Result<Json<StatsSnapshot>, ApiError> {
    Ok(Json(app.stats().snapshot().await?))
}
