//! # 근태 정정 요청 API (직원용)
//!
//! | 메서드 | 경로 | 핸들러 | 설명 |
//! |--------|------|--------|------|
//! | POST | /api/v1/time-corrections | `submit` | 정정 요청 제출 |
//! | GET | /api/v1/time-corrections/me | `my_requests` | 내 요청 목록 |
//! | GET | /api/v1/time-corrections/{id} | `detail` | 요청 상세 (본인 또는 관리자) |
//! | GET | /api/v1/time-corrections/{id}/logs | `logs` | 요청 감사 로그 |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    middleware::AuthUser,
    models::{CorrectionListQuery, CorrectionRequest, SubmitCorrectionRequest},
    routes::AppState,
};

/// `POST /time-corrections` → 201 Created
pub async fn submit(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(body): Json<SubmitCorrectionRequest>,
) -> Result<(StatusCode, Json<CorrectionRequest>), AppError> {
    let request = state.corrections.submit(&actor, body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /time-corrections/me?status=pending&limit=20&skip=0`
pub async fn my_requests(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<CorrectionListQuery>,
) -> Result<Json<Value>, AppError> {
    let requests = state.corrections.my_requests(&actor, &query).await?;
    Ok(Json(json!({ "requests": requests })))
}

pub async fn detail(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CorrectionRequest>, AppError> {
    Ok(Json(state.corrections.request_detail(&actor, &id).await?))
}

pub async fn logs(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let entries = state.corrections.request_log(&actor, &id).await?;
    Ok(Json(json!({ "logs": entries })))
}
