//! # 에러 처리 모듈
//!
//! 근태 엔진에서 발생할 수 있는 모든 에러 타입을 정의합니다.
//! Rust에서는 예외(exception) 대신 `Result<T, E>` 타입으로 에러를 처리합니다.
//!
//! 에러는 네 부류로 나뉩니다:
//! - **전제조건 위반**: 이미 출근함, 출근 기록 없음, 이미 휴식 중, 휴식 중 아님,
//!   대기 중인 정정 요청 중복. 호출자에게 그대로 돌려주며 자동 재시도하지 않습니다.
//! - **검증 실패**: 잘못된 구간, 다른 세션과 겹침, 필수 필드 누락.
//!   호출자가 입력을 고칠 수 있도록 문제 필드나 충돌 구간을 함께 담습니다.
//! - **동시성 충돌**: 낙관적 잠금(version) 불일치. 엔진이 한 번 재시도한 뒤에도
//!   실패하면 일시적 오류(503)로 내보냅니다.
//! - **저장소/내부 오류**: 호출한 작업에 치명적인 오류로 전파됩니다.
//!
//! `IntoResponse` 구현으로 핸들러가 `Err(AppError)`를 반환하면 자동으로 HTTP 응답이 됩니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::CorrectionStatus;

/// 애플리케이션에서 발생할 수 있는 모든 에러 종류
#[derive(Debug, Error)]
pub enum AppError {
    /// 요청한 리소스를 찾을 수 없음 (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// 권한 없음 (HTTP 403): 관리자 전용 작업이나 남의 요청 조회
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ── 상태 머신 전제조건 위반 (HTTP 409) ──
    #[error("An open tracking session already exists for today")]
    AlreadyClockedIn,

    #[error("No open tracking session")]
    NotClockedIn,

    #[error("The session is already paused")]
    AlreadyPaused,

    #[error("The session is not paused")]
    NotPaused,

    #[error("A pending correction request already exists for this date")]
    DuplicatePendingRequest,

    /// 이미 승인/반려된 정정 요청을 다시 처리하려는 경우
    #[error("Correction request is already {0}")]
    RequestNotPending(CorrectionStatus),

    /// 입력 검증 실패 (HTTP 422)
    /// `field`에는 문제가 된 필드 이름이 들어갑니다. (예: "requested_clock_out")
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// 요청한 구간이 같은 날짜의 다른 세션과 겹침 (HTTP 422)
    #[error("Requested time overlaps session {session_id} ({start} - {end})")]
    Overlap {
        session_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// 낙관적 동시성 검사 실패 (재시도 후에도 실패하면 HTTP 503)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// 데이터베이스 오류 (HTTP 500)
    /// #[from]: sqlx::Error → AppError::Database 자동 변환 (`?` 연산자에서 사용)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 저장된 JSON(휴식 구간, 감사 스냅샷) 직렬화/역직렬화 오류 (HTTP 500)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// 검증 실패 에러를 간단히 만드는 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 기계가 읽을 수 있는 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::AlreadyClockedIn => "already_clocked_in",
            AppError::NotClockedIn => "not_clocked_in",
            AppError::AlreadyPaused => "already_paused",
            AppError::NotPaused => "not_paused",
            AppError::DuplicatePendingRequest => "duplicate_pending_request",
            AppError::RequestNotPending(_) => "request_not_pending",
            AppError::Validation { .. } => "validation_failed",
            AppError::Overlap { .. } => "overlap_detected",
            AppError::Conflict(_) => "concurrent_modification",
            AppError::Internal(_) => "internal_error",
            AppError::Database(_) => "database_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::AlreadyClockedIn
            | AppError::NotClockedIn
            | AppError::AlreadyPaused
            | AppError::NotPaused
            | AppError::DuplicatePendingRequest
            | AppError::RequestNotPending(_) => StatusCode::CONFLICT,
            AppError::Validation { .. } | AppError::Overlap { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Conflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) | AppError::Database(_) | AppError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러(Database, Serialization, Internal)는 실제 내용을 로그에만 기록하고,
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "A database error occurred".to_string()
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                "A stored record could not be decoded".to_string()
            }
            other => other.to_string(),
        };

        // 기본 형태: { "error": { "code": ..., "message": ... } }
        let mut error = json!({
            "code": code,
            "message": message,
        });

        // 검증/겹침 에러는 호출자가 입력을 고칠 수 있도록 상세 정보를 덧붙입니다.
        match &self {
            AppError::Validation { field, .. } => {
                error["field"] = Value::String(field.clone());
            }
            AppError::Overlap {
                session_id,
                start,
                end,
            } => {
                error["conflict"] = json!({
                    "session_id": session_id,
                    "start": start,
                    "end": end,
                });
            }
            _ => {}
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
