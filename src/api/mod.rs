//! REST API endpoints.
//!
//! Axum-based HTTP API for the store tracker and the manager dashboard.
//! Signed-in callers pass the session token as `Authorization: Bearer <token>`.

pub mod routes;
pub mod state;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::KpiError;
use crate::export::ExportError;
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "STORE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<KpiError> for ApiError {
    fn from(err: KpiError) -> Self {
        match err {
            KpiError::Validation(message) => ApiError::Unprocessable(message),
            KpiError::Auth(message) => ApiError::Unauthorized(message),
            KpiError::Fetch(_) | KpiError::Insert(_) => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Empty => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Session token from the `Authorization: Bearer` header.
fn bearer_token(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Sign in first".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Expected a bearer token".to_string()))?;

    Uuid::parse_str(token.trim())
        .map_err(|_| ApiError::Unauthorized("Malformed session token".to_string()))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    record_store: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        record_store: state.records.name(),
    })
}

/// All routes, without the CORS and access-log layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/store", post(routes::auth::store_sign_in))
        .route("/api/auth/manager", post(routes::auth::manager_sign_in))
        .route("/api/auth/logout", post(routes::auth::sign_out))
        .route(
            "/api/tracker",
            get(routes::tracker::show).put(routes::tracker::update),
        )
        .route("/api/tracker/confirm", post(routes::tracker::confirm))
        .route("/api/tracker/cancel", post(routes::tracker::cancel))
        .route("/api/tracker/submit", post(routes::tracker::submit))
        .route("/api/calculate", post(routes::tracker::calculate))
        .route("/api/dashboard", get(routes::dashboard::show))
        .route("/api/dashboard/export", get(routes::dashboard::export))
        .with_state(state)
}

/// Wrap the router in the layers configured for serving.
pub fn with_server_layers(
    router: Router,
    server: &ServerConfig,
) -> Result<Router, header::InvalidHeaderValue> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let cors = if server.cors_origin == "*" {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(HeaderValue::from_str(&server.cors_origin)?)
    };

    let router = router.layer(cors);
    Ok(if server.access_log {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    })
}
