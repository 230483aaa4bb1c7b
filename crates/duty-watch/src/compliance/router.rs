use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{AlertId, DriverId, YearMonth};
use super::repository::{AlertQuery, AlertStore, DriverDirectory, StoreError, WorkRecordStore};
use super::scheduler::DEFAULT_SWEEP_LOOKBACK_DAYS;
use super::service::{ComplianceError, ComplianceService};

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub driver_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct SweepRequest {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    #[serde(default)]
    pub lookback_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct BulkAcknowledgeRequest {
    pub alert_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MonthQuery {
    pub(crate) month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetailQuery {
    pub(crate) today: Option<NaiveDate>,
}

/// HTTP surface of the compliance engine.
pub fn compliance_router<W, A, D>(service: Arc<ComplianceService<W, A, D>>) -> Router
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    Router::new()
        .route("/api/v1/compliance/status", get(live_status::<W, A, D>))
        .route("/api/v1/compliance/alerts", get(search_alerts::<W, A, D>))
        .route(
            "/api/v1/compliance/alerts/unacknowledged-count",
            get(unacknowledged_count::<W, A, D>),
        )
        .route(
            "/api/v1/compliance/alerts/acknowledge-bulk",
            post(acknowledge_bulk::<W, A, D>),
        )
        .route(
            "/api/v1/compliance/alerts/:alert_id/acknowledge",
            post(acknowledge_alert::<W, A, D>),
        )
        .route(
            "/api/v1/compliance/drivers/:driver_id/detail",
            get(driver_detail::<W, A, D>),
        )
        .route(
            "/api/v1/compliance/drivers/:driver_id/monthly",
            get(driver_monthly::<W, A, D>),
        )
        .route("/api/v1/compliance/stats/monthly", get(company_monthly::<W, A, D>))
        .route("/api/v1/compliance/evaluate", post(evaluate_day::<W, A, D>))
        .route("/api/v1/compliance/sweep", post(run_sweep::<W, A, D>))
        .route("/api/v1/compliance/settings", get(settings::<W, A, D>))
        .with_state(service)
}

pub(crate) async fn live_status<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    match service.live_board(Utc::now()) {
        Ok(board) => (StatusCode::OK, Json(board)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn search_alerts<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
    Query(query): Query<AlertQuery>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    match service.search_alerts(&query) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn unacknowledged_count<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    match service.unacknowledged_counts() {
        Ok(tally) => (
            StatusCode::OK,
            Json(json!({ "total": tally.total(), "by_level": tally })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn acknowledge_alert<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
    Path(alert_id): Path<String>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    match service.acknowledge(&AlertId(alert_id)) {
        Ok(alert) => (StatusCode::OK, Json(alert)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn acknowledge_bulk<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
    Json(payload): Json<BulkAcknowledgeRequest>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    let ids: Vec<AlertId> = payload.alert_ids.into_iter().map(AlertId).collect();
    match service.bulk_acknowledge(&ids) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn driver_detail<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
    Path(driver_id): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    // An overridden day is inspected as of its last second.
    let at = query
        .today
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|end_of_day| end_of_day.and_utc())
        .unwrap_or_else(Utc::now);
    match service.driver_detail(&DriverId(driver_id), at) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn driver_monthly<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
    Path(driver_id): Path<String>,
    Query(query): Query<MonthQuery>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    let month = match resolve_month(query.month.as_deref()) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.monthly_summary(&DriverId(driver_id), month) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn company_monthly<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
    Query(query): Query<MonthQuery>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    let month = match resolve_month(query.month.as_deref()) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.company_monthly_stats(month) {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn evaluate_day<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
    Json(payload): Json<EvaluateRequest>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    match service.evaluate_driver_day(&DriverId(payload.driver_id), payload.date) {
        Ok(Some(report)) => (
            StatusCode::OK,
            Json(json!({ "evaluated": true, "report": report })),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::OK,
            Json(json!({ "evaluated": false, "report": null })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn run_sweep<W, A, D>(
    State(service): State<Arc<ComplianceService<W, A, D>>>,
    Json(payload): Json<SweepRequest>,
) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    let as_of = payload.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let lookback = payload.lookback_days.unwrap_or(DEFAULT_SWEEP_LOOKBACK_DAYS);
    match service.sweep(as_of, lookback) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn settings<W, A, D>(State(service): State<Arc<ComplianceService<W, A, D>>>) -> Response
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    (StatusCode::OK, Json(service.policy().clone())).into_response()
}

fn resolve_month(raw: Option<&str>) -> Result<YearMonth, Response> {
    match raw {
        None => Ok(YearMonth::of(Utc::now().date_naive())),
        Some(raw) => YearMonth::parse(raw).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid month {raw}, expected YYYY-MM") })),
            )
                .into_response()
        }),
    }
}

fn error_response(error: ComplianceError) -> Response {
    let status = match &error {
        ComplianceError::UnknownDriver(_) => StatusCode::NOT_FOUND,
        ComplianceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        ComplianceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        ComplianceError::Store(StoreError::Unavailable(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        ComplianceError::Aggregate(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ComplianceError::InvalidMonth(_) => StatusCode::BAD_REQUEST,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
