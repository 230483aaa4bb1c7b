use super::common::*;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use serde_json::json;
use tower::ServiceExt;

use crate::compliance::domain::DriverId;
use crate::compliance::router::EvaluateRequest;

fn evaluated(service: &TestService, driver: &str, day: chrono::NaiveDate) -> Vec<String> {
    service
        .evaluate_driver_day(&DriverId(driver.to_string()), day)
        .expect("evaluation succeeds")
        .expect("day evaluated")
        .created_alerts
        .iter()
        .map(|alert| alert.id.0.clone())
        .collect()
}

#[tokio::test]
async fn status_route_reports_the_live_board() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    records.insert(open_shift("drv-1", Utc::now().date_naive(), 0));
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/compliance/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["summary"]["total_drivers"], 1);
    assert_eq!(payload["summary"]["working"], 1);
    assert_eq!(payload["drivers"][0]["driver_id"], "drv-1");
}

#[tokio::test]
async fn alert_search_route_filters_by_level() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    records.insert(long_day("drv-1", d(2026, 3, 9), (21, 0)));
    evaluated(&service, "drv-1", d(2026, 3, 9));
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/compliance/alerts?level=critical")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total"], 2);
    assert_eq!(payload["alerts"][0]["alert_level"], "critical");
}

#[tokio::test]
async fn unacknowledged_count_route_breaks_down_by_level() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    records.insert(long_day("drv-1", d(2026, 3, 9), (21, 0)));
    evaluated(&service, "drv-1", d(2026, 3, 9));
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/compliance/alerts/unacknowledged-count")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["total"], 3);
    assert_eq!(payload["by_level"]["violation"], 1);
    assert_eq!(payload["by_level"]["critical"], 2);
}

#[tokio::test]
async fn acknowledge_route_marks_the_alert() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    records.insert(long_day("drv-1", d(2026, 3, 9), (21, 0)));
    let ids = evaluated(&service, "drv-1", d(2026, 3, 9));
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::post(format!(
                "/api/v1/compliance/alerts/{}/acknowledge",
                ids[0]
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["acknowledged"], true);
}

#[tokio::test]
async fn acknowledge_handler_returns_not_found_for_unknown_alerts() {
    let (service, _records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");

    let response = crate::compliance::router::acknowledge_alert::<
        MemoryRecordStore,
        MemoryAlertStore,
        MemoryDirectory,
    >(State(service), Path("nope".to_string()))
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_acknowledge_route_reports_partial_failures() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    records.insert(long_day("drv-1", d(2026, 3, 9), (21, 0)));
    let ids = evaluated(&service, "drv-1", d(2026, 3, 9));
    let router = compliance_router_with_service(service);

    let body = json!({ "alert_ids": [ids[0], "nope"] });
    let response = router
        .oneshot(
            Request::post("/api/v1/compliance/alerts/acknowledge-bulk")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["acknowledged"], 1);
    assert_eq!(payload["failed"].as_array().expect("failures array").len(), 1);
}

#[tokio::test]
async fn evaluate_route_reports_created_alerts() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    records.insert(long_day("drv-1", d(2026, 3, 9), (21, 0)));
    let router = compliance_router_with_service(service);

    let body = json!({ "driver_id": "drv-1", "date": "2026-03-09" });
    let response = router
        .oneshot(
            Request::post("/api/v1/compliance/evaluate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["evaluated"], true);
    assert_eq!(
        payload["report"]["created_alerts"]
            .as_array()
            .expect("alerts array")
            .len(),
        3
    );
}

#[tokio::test]
async fn evaluate_route_reports_recordless_days() {
    let (service, _records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    let router = compliance_router_with_service(service);

    let body = json!({ "driver_id": "drv-1", "date": "2026-03-09" });
    let response = router
        .oneshot(
            Request::post("/api/v1/compliance/evaluate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["evaluated"], false);
    assert!(payload["report"].is_null());
}

#[tokio::test]
async fn evaluate_handler_rejects_unknown_drivers() {
    let (service, _records, _alerts, _drivers) = build_service();

    let response = crate::compliance::router::evaluate_day::<
        MemoryRecordStore,
        MemoryAlertStore,
        MemoryDirectory,
    >(
        State(service),
        axum::Json(EvaluateRequest {
            driver_id: "ghost".to_string(),
            date: d(2026, 3, 9),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn evaluate_route_rejects_malformed_records() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    let date = d(2026, 3, 9);
    let mut record = workday("drv-1", date);
    record.breaks = vec![crate::compliance::domain::BreakInterval {
        start: at(date, 13, 0),
        end: at(date, 12, 0),
    }];
    records.insert(record);
    let router = compliance_router_with_service(service);

    let body = json!({ "driver_id": "drv-1", "date": "2026-03-09" });
    let response = router
        .oneshot(
            Request::post("/api/v1/compliance/evaluate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn monthly_route_validates_the_month() {
    let (service, _records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/compliance/drivers/drv-1/monthly?month=2026-13")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn monthly_route_summarizes_the_requested_month() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    records.insert(workday("drv-1", d(2026, 3, 3)));
    records.insert(workday("drv-1", d(2026, 3, 4)));
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/compliance/drivers/drv-1/monthly?month=2026-03")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["month"], "2026-03");
    assert_eq!(payload["work_days"], 2);
}

#[tokio::test]
async fn stats_route_rolls_up_the_fleet() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    drivers.add("drv-2", "Sato Yui");
    records.insert(workday("drv-1", d(2026, 3, 3)));
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/compliance/stats/monthly?month=2026-03")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["active_drivers"], 2);
    assert_eq!(payload["drivers_with_records"], 1);
}

#[tokio::test]
async fn sweep_route_runs_with_explicit_bounds() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    records.insert(long_day("drv-1", d(2026, 3, 9), (21, 0)));
    let router = compliance_router_with_service(service);

    let body = json!({ "as_of": "2026-03-10", "lookback_days": 3 });
    let response = router
        .oneshot(
            Request::post("/api/v1/compliance/sweep")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["drivers_scanned"], 1);
    assert_eq!(payload["days_evaluated"], 1);
    assert_eq!(payload["alerts_created"], 3);
}

#[tokio::test]
async fn settings_route_exposes_the_policy() {
    let (service, _records, _alerts, _drivers) = build_service();
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/compliance/settings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["daily_binding_limit"], 780);
    assert_eq!(payload["warning_threshold_percent"], 90);
}

#[tokio::test]
async fn driver_detail_honors_the_today_override() {
    let (service, records, _alerts, drivers) = build_service();
    drivers.add("drv-1", "Aoki Kenji");
    records.insert(workday("drv-1", d(2026, 3, 9)));
    records.insert(workday("drv-1", d(2026, 3, 10)));
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/compliance/drivers/drv-1/detail?today=2026-03-10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["driver_name"], "Aoki Kenji");
    assert_eq!(payload["month"]["work_days"], 2);
    assert_eq!(
        payload["recent_days"].as_array().expect("trend array").len(),
        2
    );
    assert_eq!(payload["live"]["is_working"], false);
}

#[tokio::test]
async fn driver_detail_route_requires_a_known_driver() {
    let (service, _records, _alerts, _drivers) = build_service();
    let router = compliance_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/compliance/drivers/ghost/detail")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
