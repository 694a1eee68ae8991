use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use recsys_core::persist::{load_artifacts, resolve, ArtifactPaths};
use recsys_core::reference::RefEntry;
use recsys_core::{validate_k, QueryError, Recommendation, Recommender, SharedRecommender, DEFAULT_K};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Raw query string; parsed by the handler so malformed values still get a
/// JSON error body.
#[derive(Deserialize)]
pub struct RecommendParams {
    pub title: Option<String>,
    pub k: Option<String>,
}

#[derive(Serialize)]
pub struct RecommendResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<Recommendation>,
}

#[derive(Clone)]
pub struct AppState {
    pub artifacts_root: PathBuf,
    pub recommender: Arc<SharedRecommender>,
    pub admin_token: Option<String>,
    pub load_timeout: Duration,
}

/// Request failures rendered as `{error, kind}` with a matching status code.
pub enum ApiError {
    Query(QueryError),
    InvalidK(String),
    BadRequest(String),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self { ApiError::Query(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, kind) = match self {
            ApiError::Query(e) => {
                let status = match e {
                    QueryError::TitleNotFound(_) => StatusCode::NOT_FOUND,
                    QueryError::InvalidK(_) => StatusCode::BAD_REQUEST,
                    QueryError::ArtifactsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, e.to_string(), e.kind())
            }
            ApiError::InvalidK(raw) => (StatusCode::BAD_REQUEST, format!("k must be a positive integer, got '{raw}'"), "invalid_k"),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message, "invalid_request"),
        };
        (status, Json(serde_json::json!({ "error": error, "kind": kind }))).into_response()
    }
}

/// Missing `k` means [`DEFAULT_K`]; anything that is not an integer is rejected.
fn parse_k(raw: Option<&str>) -> Result<usize, ApiError> {
    let k = match raw.map(str::trim) {
        None | Some("") => DEFAULT_K as i64,
        Some(s) => s.parse::<i64>().map_err(|_| ApiError::InvalidK(s.to_string()))?,
    };
    Ok(validate_k(k)?)
}

/// Load an artifact set off the async runtime, failing if it takes longer than
/// `timeout`. Callers refuse to serve on error.
pub async fn load_recommender(root: PathBuf, build_id: Option<String>, timeout: Duration) -> Result<Recommender> {
    load_with_timeout(timeout, move || {
        let handle = resolve(&ArtifactPaths::new(&root), build_id.as_deref())?;
        Ok(load_artifacts(&handle)?.into_recommender()?)
    })
    .await
}

/// Run a blocking loader on the blocking pool under a deadline. A loader that
/// overruns is abandoned and reported as an error, never installed.
pub async fn load_with_timeout<F>(timeout: Duration, load: F) -> Result<Recommender>
where
    F: FnOnce() -> Result<Recommender> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(load);
    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined.context("artifact loader panicked")?,
        Err(_) => Err(anyhow!("artifact load timed out after {}s", timeout.as_secs_f64())),
    }
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/recommend", get(recommend_handler))
        .route("/titles/:index", get(title_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.recommender.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "artifacts unavailable")
    }
}

pub async fn recommend_handler(
    State(state): State<AppState>,
    params: Result<Query<RecommendParams>, QueryRejection>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let start = std::time::Instant::now();
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let title = match params.title {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(ApiError::BadRequest("missing query parameter 'title'".into())),
    };
    let k = parse_k(params.k.as_deref())?;
    let results = match state.recommender.recommend_scored(&title, k) {
        Ok(results) => results,
        Err(e) => {
            tracing::debug!(%title, kind = e.kind(), "recommend failed");
            return Err(e.into());
        }
    };
    let took_s = start.elapsed().as_secs_f64();
    Ok(Json(RecommendResponse { query: title, took_s, results }))
}

pub async fn title_handler(State(state): State<AppState>, Path(index): Path<usize>) -> Result<Json<RefEntry>, Response> {
    let current = state.recommender.current().map_err(|e| ApiError::Query(e).into_response())?;
    match current.table().get(index) {
        Some(entry) => Ok(Json(entry.clone())),
        None => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))).into_response()),
    }
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let recommender = load_recommender(state.artifacts_root.clone(), None, state.load_timeout)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "reload failed; keeping current artifacts");
            (StatusCode::SERVICE_UNAVAILABLE, format!("reload failed: {e:#}"))
        })?;
    let body = serde_json::json!({ "fingerprint": recommender.fingerprint(), "num_docs": recommender.len() });
    state.recommender.install(recommender);
    Ok(Json(body))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
