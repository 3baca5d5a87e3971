//! Shared fixtures for route tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use crate::api::build_router;
use crate::api::state::AppState;
use crate::models::{ManagerAccount, StoreAccount};
use crate::storage::{Backend, JsonlStore, StorageConfig};

pub async fn setup_test_state(dir: &std::path::Path) -> AppState {
    let store = Arc::new(JsonlStore::new(StorageConfig::new(dir.to_path_buf())));
    store
        .upsert_store(StoreAccount::new("S001", "Oxford Street", "pw"))
        .await
        .unwrap();
    store
        .upsert_store(StoreAccount::new("S002", "Kings Road", "pw"))
        .await
        .unwrap();
    store
        .upsert_manager(ManagerAccount::new("m1", "Dana", "secret").with_region("London"))
        .await
        .unwrap();

    AppState::new(
        Backend {
            records: store.clone(),
            directory: store,
        },
        20.0,
    )
}

pub async fn send(
    state: &AppState,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let resp = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub async fn store_token(state: &AppState, store_id: &str) -> String {
    let (status, json) = send(
        state,
        Method::POST,
        "/api/auth/store",
        None,
        Some(json!({"store_id": store_id, "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["token"].as_str().unwrap().to_string()
}

pub async fn manager_token(state: &AppState) -> String {
    let (status, json) = send(
        state,
        Method::POST,
        "/api/auth/manager",
        None,
        Some(json!({"name": "Dana", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["token"].as_str().unwrap().to_string()
}

/// Sign a store in, enter a tally, confirm and submit it.
pub async fn submit_tally(state: &AppState, store_id: &str, yes: u32, no: u32) {
    let token = store_token(state, store_id).await;
    let (status, _) = send(
        state,
        Method::PUT,
        "/api/tracker",
        Some(&token),
        Some(json!({"yes_count": yes, "no_count": no})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(state, Method::POST, "/api/tracker/confirm", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(state, Method::POST, "/api/tracker/submit", Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
}
