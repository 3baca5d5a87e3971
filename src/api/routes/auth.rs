use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::{bearer_token, ApiError};
use crate::models::{ManagerIdentity, StoreIdentity};
use crate::session::{self, Session};

#[derive(Debug, Deserialize)]
pub struct StoreSignIn {
    #[serde(default, deserialize_with = "crate::models::de::lenient_string")]
    pub store_id: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ManagerSignIn {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct StoreSignedIn {
    pub token: Uuid,
    pub store: StoreIdentity,
}

#[derive(Debug, Serialize)]
pub struct ManagerSignedIn {
    pub token: Uuid,
    pub manager: ManagerIdentity,
}

pub async fn store_sign_in(
    State(state): State<AppState>,
    Json(body): Json<StoreSignIn>,
) -> Result<Json<StoreSignedIn>, ApiError> {
    let tracker = session::sign_in_store(
        state.directory.as_ref(),
        &body.store_id,
        &body.password,
        state.default_target_rate,
    )
    .await?;
    let store = tracker.store().clone();
    let token = state.sessions.open(Session::Store(tracker)).await;

    Ok(Json(StoreSignedIn { token, store }))
}

pub async fn manager_sign_in(
    State(state): State<AppState>,
    Json(body): Json<ManagerSignIn>,
) -> Result<Json<ManagerSignedIn>, ApiError> {
    let view =
        session::sign_in_manager(state.directory.as_ref(), &body.name, &body.password).await?;
    let manager = view.manager().clone();
    let token = state.sessions.open(Session::Manager(view)).await;

    Ok(Json(ManagerSignedIn { token, manager }))
}

pub async fn sign_out(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers)?;
    if state.sessions.close(&token).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Unauthorized(
            "Session expired or unknown. Sign in again.".to_string(),
        ))
    }
}
