use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::{bearer_token, ApiError};
use crate::calculate;
use crate::error::KpiError;
use crate::models::{
    NewSubmission, SubmissionRecord, TallyFeedback, TallyInput, TallyPatch, INCOMPLETE_MESSAGE,
};
use crate::session::{TrackerView, SUBMITTED_MESSAGE};

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub pending: NewSubmission,
    pub feedback: TallyFeedback,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: &'static str,
    pub record: SubmissionRecord,
}

pub async fn show(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<TrackerView>, ApiError> {
    let token = bearer_token(&headers)?;
    let view = state
        .sessions
        .with_tracker(&token, |tracker| Ok(tracker.view()))
        .await?;
    Ok(Json(view))
}

pub async fn update(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(patch): Json<TallyPatch>,
) -> Result<Json<TrackerView>, ApiError> {
    let token = bearer_token(&headers)?;
    let view = state
        .sessions
        .with_tracker(&token, |tracker| tracker.update(&patch))
        .await?;
    Ok(Json(view))
}

pub async fn confirm(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let (pending, feedback) = state
        .sessions
        .with_tracker(&token, |tracker| {
            let pending = tracker.request_submit()?;
            let feedback = tracker
                .feedback()
                .ok_or_else(|| KpiError::validation(INCOMPLETE_MESSAGE))?;
            Ok((pending, feedback))
        })
        .await?;
    Ok(Json(ConfirmResponse { pending, feedback }))
}

pub async fn cancel(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<TrackerView>, ApiError> {
    let token = bearer_token(&headers)?;
    let view = state
        .sessions
        .with_tracker(&token, |tracker| {
            tracker.cancel();
            Ok(tracker.view())
        })
        .await?;
    Ok(Json(view))
}

pub async fn submit(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let token = bearer_token(&headers)?;
    let record = state
        .sessions
        .submit_confirmed(&token, state.records.as_ref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: SUBMITTED_MESSAGE,
            record,
        }),
    ))
}

/// Stateless feedback for a tally. A missing target falls back to the default.
pub async fn calculate(
    State(state): State<AppState>,
    Json(patch): Json<TallyPatch>,
) -> Result<Json<TallyFeedback>, ApiError> {
    let mut input = TallyInput {
        target_rate: Some(state.default_target_rate),
        ..TallyInput::empty()
    };
    input.apply(&patch)?;
    let tally = input.require_complete()?;
    Ok(Json(calculate::evaluate(&tally)))
}
