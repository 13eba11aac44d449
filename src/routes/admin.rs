//! # 관리자 API
//!
//! | 메서드 | 경로 | 핸들러 |
//! |--------|------|--------|
//! | GET | /api/v1/admin/tracker | `list_sessions` |
//! | GET | /api/v1/admin/time-corrections | `list_requests` |
//! | PATCH | /api/v1/admin/time-corrections/{id}/approve | `approve` |
//! | PATCH | /api/v1/admin/time-corrections/{id}/reject | `reject` |
//! | POST | /api/v1/admin/reconciliation/run | `run_reconciliation` |
//!
//! 관리자 권한 검사는 서비스 계층이 하고, 권한이 없으면 403이 됩니다.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::AuthUser,
    models::{AdminSessionQuery, CorrectionListQuery, CorrectionRequest, ReviewRequest},
    routes::AppState,
    services::ReconciliationSummary,
};

pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<AdminSessionQuery>,
) -> Result<Json<Value>, AppError> {
    let sessions = state.tracker.list_sessions(&actor, &query).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

pub async fn list_requests(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<CorrectionListQuery>,
) -> Result<Json<Value>, AppError> {
    let requests = state.corrections.all_requests(&actor, &query).await?;
    Ok(Json(json!({ "requests": requests })))
}

/// 본문은 생략할 수 있습니다. (`{ "admin_notes": "..." }`)
pub async fn approve(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<CorrectionRequest>, AppError> {
    let notes = body.and_then(|Json(b)| b.admin_notes);
    Ok(Json(state.corrections.approve(&actor, &id, notes).await?))
}

/// 반려에는 `admin_notes`가 필요합니다.
pub async fn reject(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<CorrectionRequest>, AppError> {
    let notes = body.and_then(|Json(b)| b.admin_notes);
    Ok(Json(state.corrections.reject(&actor, &id, notes).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconciliationRunQuery {
    /// 생략하면 가장 최근에 지난 마감의 업무일
    pub date: Option<NaiveDate>,
}

/// `POST /admin/reconciliation/run[?date=2025-03-10]`
pub async fn run_reconciliation(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ReconciliationRunQuery>,
) -> Result<Json<ReconciliationSummary>, AppError> {
    if !actor.is_admin {
        return Err(AppError::Forbidden("admin role required".to_string()));
    }
    let date = query
        .date
        .unwrap_or_else(|| state.reconciliation.latest_cutoff_date());

    tracing::info!(requested_by = %actor.subject_id, cutoff_date = %date, "manual reconciliation run");
    Ok(Json(state.reconciliation.run_daily_reconciliation(date).await?))
}
