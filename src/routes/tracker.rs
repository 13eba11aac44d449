//! # 근태 기록 API 라우트 핸들러
//!
//! ## 엔드포인트 목록
//! | 메서드 | 경로 | 핸들러 | 설명 |
//! |--------|------|--------|------|
//! | POST | /api/v1/tracker/clock-in | `clock_in` | 출근 |
//! | POST | /api/v1/tracker/pause | `pause` | 휴식 시작 |
//! | POST | /api/v1/tracker/resume | `resume` | 업무 복귀 |
//! | POST | /api/v1/tracker/clock-out | `clock_out` | 퇴근 |
//! | GET | /api/v1/tracker/current | `current` | 진행 중인 세션과 실시간 합계 |
//! | GET | /api/v1/tracker/history | `history` | 본인 세션 이력 (최신순) |
//! | GET | /api/v1/tracker/by-date | `by_date` | 특정 날짜의 세션 목록 |
//!
//! 모든 엔드포인트는 Bearer 토큰이 필요합니다 (`AuthUser` Extractor).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::AuthUser,
    models::{ByDateQuery, CurrentSession, HistoryQuery, TrackingSession},
    routes::AppState,
};

/// `POST /tracker/clock-in` → 201 Created + 새 세션
pub async fn clock_in(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<(StatusCode, Json<TrackingSession>), AppError> {
    let session = state.tracker.clock_in(&actor).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn pause(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<TrackingSession>, AppError> {
    Ok(Json(state.tracker.pause(&actor).await?))
}

pub async fn resume(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<TrackingSession>, AppError> {
    Ok(Json(state.tracker.resume(&actor).await?))
}

pub async fn clock_out(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<TrackingSession>, AppError> {
    Ok(Json(state.tracker.clock_out(&actor).await?))
}

/// `GET /tracker/current`
///
/// 진행 중인 세션이 없으면 `has_active_session: false`와 null 필드들을 돌려줍니다.
pub async fn current(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<CurrentSession>, AppError> {
    Ok(Json(state.tracker.current_session(&actor).await?))
}

/// `GET /tracker/history?start_date=2025-03-01&end_date=2025-03-31&status=completed`
pub async fn history(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, AppError> {
    let sessions = state.tracker.history(&actor, &query).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

/// `GET /tracker/by-date?date=2025-03-10[&user_id=...]`
pub async fn by_date(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ByDateQuery>,
) -> Result<Json<Value>, AppError> {
    let sessions = state
        .tracker
        .sessions_for_date(&actor, query.date, query.user_id.as_deref())
        .await?;
    Ok(Json(json!({ "date": query.date, "sessions": sessions })))
}
