mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use common::{day, setup, JWT_SECRET};
use timecard::middleware::auth::create_access_token;
use timecard::routes::build_router;

fn token(subject: &str, role: &str) -> String {
    create_access_token(subject, role, JWT_SECRET, Duration::minutes(5)).unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn clock_in_twice_over_http() {
    let app = setup().await;
    let router = build_router(app.state());
    let me = token("emp-1", "employee");

    let (status, body) = send(&router, Method::POST, "/api/v1/tracker/clock-in", Some(&me), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "active");
    assert_eq!(body["business_date"], "2025-03-10");
    assert!(body.get("version").is_none());

    let (status, body) = send(&router, Method::POST, "/api/v1/tracker/clock-in", Some(&me), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "already_clocked_in");

    app.set_time(day(2025, 3, 10), 10, 0);
    let (status, body) = send(&router, Method::GET, "/api/v1/tracker/current", Some(&me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_active_session"], true);
    assert_eq!(body["current_work_seconds"], 3600);
}

#[tokio::test]
async fn pause_without_session_is_a_conflict() {
    let app = setup().await;
    let router = build_router(app.state());
    let me = token("emp-1", "employee");

    let (status, body) = send(&router, Method::POST, "/api/v1/tracker/pause", Some(&me), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "not_clocked_in");
}

#[tokio::test]
async fn requests_need_a_valid_token() {
    let app = setup().await;
    let router = build_router(app.state());

    let (status, body) = send(&router, Method::GET, "/api/v1/tracker/current", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "missing_token");

    let forged = create_access_token("emp-1", "admin", "not-the-secret", Duration::minutes(5)).unwrap();
    let (status, body) = send(&router, Method::GET, "/api/v1/tracker/current", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_token");
}

#[tokio::test]
async fn admin_routes_refuse_employees() {
    let app = setup().await;
    let router = build_router(app.state());
    let me = token("emp-1", "employee");

    let (status, body) = send(&router, Method::GET, "/api/v1/admin/time-corrections", Some(&me), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");

    let boss = token("boss", "admin");
    let (status, body) = send(&router, Method::GET, "/api/v1/admin/time-corrections", Some(&boss), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requests"], json!([]));
}

#[tokio::test]
async fn health_reports_database_state() {
    let app = setup().await;
    let router = build_router(app.state());

    let (status, body) = send(&router, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn invalid_correction_points_at_the_field() {
    let app = setup().await;
    let router = build_router(app.state());
    let me = token("emp-1", "employee");
    send(&router, Method::POST, "/api/v1/tracker/clock-in", Some(&me), None).await;

    let body = json!({
        "request_date": "2025-03-10",
        "issue_type": "missed_clock_out",
        "requested_clock_out": "2025-03-10T08:00:00",
        "reason": "left early",
    });
    let (status, body) = send(&router, Method::POST, "/api/v1/time-corrections", Some(&me), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_failed");
    assert_eq!(body["error"]["field"], "requested_clock_out");
}

#[tokio::test]
async fn correction_round_trip_over_http() {
    let app = setup().await;
    let router = build_router(app.state());
    let me = token("emp-1", "employee");
    let boss = token("boss", "admin");

    send(&router, Method::POST, "/api/v1/tracker/clock-in", Some(&me), None).await;
    app.set_time(day(2025, 3, 10), 21, 0);

    let body = json!({
        "request_date": "2025-03-10",
        "issue_type": "missed_clock_out",
        "requested_clock_out": "2025-03-10T17:00:00+05:30",
        "reason": "forgot to clock out",
    });
    let (status, created) = send(&router, Method::POST, "/api/v1/time-corrections", Some(&me), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    // 반려에는 메모가 필요합니다.
    let (status, body) = send(
        &router,
        Method::PATCH,
        &format!("/api/v1/admin/time-corrections/{id}/reject"),
        Some(&boss),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["field"], "admin_notes");

    let (status, approved) = send(
        &router,
        Method::PATCH,
        &format!("/api/v1/admin/time-corrections/{id}/approve"),
        Some(&boss),
        Some(json!({ "admin_notes": "matches badge log" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    assert_eq!(approved["reviewer_id"], "boss");

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/v1/tracker/by-date?date=2025-03-10",
        Some(&me),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"][0]["status"], "completed");
    assert_eq!(body["sessions"][0]["total_work_seconds"], 8 * 3600);

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("/api/v1/time-corrections/{id}/logs"),
        Some(&me),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<_> = body["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions, vec!["created", "approved"]);

    let other = token("emp-2", "employee");
    let (status, _) = send(
        &router,
        Method::GET,
        &format!("/api/v1/time-corrections/{id}"),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reconciliation_can_be_triggered_by_an_admin() {
    let app = setup().await;
    let router = build_router(app.state());
    let me = token("emp-1", "employee");
    let boss = token("boss", "admin");

    send(&router, Method::POST, "/api/v1/tracker/clock-in", Some(&me), None).await;
    app.set_time(day(2025, 3, 10), 23, 10);

    let (status, _) = send(&router, Method::POST, "/api/v1/admin/reconciliation/run", Some(&me), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, summary) = send(
        &router,
        Method::POST,
        "/api/v1/admin/reconciliation/run?date=2025-03-10",
        Some(&boss),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["cutoff_date"], "2025-03-10");
    assert_eq!(summary["closed"], 1);
}
