use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{bearer_token, ApiError};
use crate::export::{self, EXPORT_FILE_NAME};
use crate::models::{DateRange, EnrichedRecord, RegionSummary, StrikeRateBar, TargetSlice};
use crate::session::FetchOutcome;

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChartData {
    pub strike_rates: Vec<StrikeRateBar>,
    pub target_split: Vec<TargetSlice>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub range: DateRange,
    /// Rows are every submission in range, not one per store
    pub filtered: bool,
    /// False when a newer request for this session replaced these rows
    pub current: bool,
    pub rows: Vec<EnrichedRecord>,
    pub summary: RegionSummary,
    pub charts: ChartData,
}

pub async fn show(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let range = DateRange::parse(params.start.as_deref(), params.end.as_deref())?;

    let (outcome, ranked) = state
        .sessions
        .refresh_dashboard(&token, state.records.as_ref(), range)
        .await?;

    let charts = ChartData {
        strike_rates: ranked.bar_series(),
        target_split: ranked.summary.target_split(),
    };
    Ok(Json(DashboardResponse {
        range,
        filtered: ranked.filtered,
        current: outcome == FetchOutcome::Applied,
        rows: ranked.rows,
        summary: ranked.summary,
        charts,
    }))
}

/// CSV of the rows currently loaded in this manager's dashboard.
pub async fn export(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers)?;
    let rows = state
        .sessions
        .with_dashboard(&token, |view| Ok(view.rows().to_vec()))
        .await?;

    let body = export::to_csv_bytes(&rows)?;
    tracing::info!("Exported {} dashboard rows", rows.len());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::routes::testing::{
        manager_token, send, setup_test_state, store_token, submit_tally,
    };
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::{Duration, Utc};
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_dashboard_ranks_latest_per_store() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path()).await;
        submit_tally(&state, "S001", 1, 9).await;
        submit_tally(&state, "S002", 3, 7).await;
        submit_tally(&state, "S001", 5, 5).await;
        let token = manager_token(&state).await;

        let (status, json) = send(&state, Method::GET, "/api/dashboard", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["filtered"], false);
        assert_eq!(json["current"], true);
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["store_name"], "Oxford Street");
        assert_eq!(rows[0]["vs_target"], 30.0);
        assert_eq!(rows[0]["rank"], 1);
        assert_eq!(rows[1]["store_name"], "Kings Road");
        assert_eq!(json["summary"]["total_submissions"], 2);
        assert_eq!(json["summary"]["average_strike_rate"], 40.0);
        assert_eq!(json["summary"]["stores_meeting_target"], 2);
        assert_eq!(json["charts"]["strike_rates"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dashboard_range_keeps_every_submission() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path()).await;
        submit_tally(&state, "S001", 1, 9).await;
        submit_tally(&state, "S001", 5, 5).await;
        let token = manager_token(&state).await;

        let today = Utc::now().date_naive();
        let uri = format!("/api/dashboard?start={}", today - Duration::days(1));
        let (status, json) = send(&state, Method::GET, &uri, Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["filtered"], true);
        assert_eq!(json["rows"].as_array().unwrap().len(), 2);
        assert_eq!(json["summary"]["stores_below_target"], 1);

        let uri = format!("/api/dashboard?start={}", today + Duration::days(2));
        let (_, json) = send(&state, Method::GET, &uri, Some(&token), None).await;
        assert!(json["rows"].as_array().unwrap().is_empty());
        assert_eq!(json["summary"]["average_strike_rate"], 0.0);
    }

    #[tokio::test]
    async fn test_dashboard_rejects_bad_range() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path()).await;
        let token = manager_token(&state).await;

        let (status, _) = send(
            &state,
            Method::GET,
            "/api/dashboard?start=2026-03-02&end=2026-03-01",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let store = store_token(&state, "S001").await;
        let (status, _) = send(&state, Method::GET, "/api/dashboard", Some(&store), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_export_before_loading_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path()).await;
        submit_tally(&state, "S001", 1, 9).await;
        let token = manager_token(&state).await;

        let (status, json) = send(
            &state,
            Method::GET,
            "/api/dashboard/export",
            Some(&token),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["message"], "No data to export");
    }

    #[tokio::test]
    async fn test_export_loaded_rows_as_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path()).await;
        submit_tally(&state, "S001", 1, 9).await;
        submit_tally(&state, "S002", 3, 7).await;
        let token = manager_token(&state).await;
        send(&state, Method::GET, "/api/dashboard", Some(&token), None).await;

        let resp = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/dashboard/export")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.contains("KPI_Submissions.csv"));

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Kings Road"));
        assert!(lines[2].contains("Oxford Street"));
    }
}
