//! # 근태 정정 요청 쿼리 모듈
//!
//! `correction_requests` 테이블을 다루는 SQL 쿼리 함수들입니다.
//!
//! 대기(pending) 중인 요청은 (subject, 날짜)마다 하나뿐이고, 부분 UNIQUE 인덱스
//! `idx_correction_requests_one_pending`가 이를 보장합니다.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sqlx::SqliteConnection;

use super::sessions::{decode_pauses, encode_pauses, is_unique_violation};
use super::{format_timestamp, parse_date, parse_enum, parse_optional_timestamp, parse_timestamp};
use crate::error::AppError;
use crate::models::{CorrectionRequest, CorrectionStatus, PauseInterval};

const REQUEST_COLUMNS: &str = r#"
    id, subject_id, target_session_id, request_date, issue_type,
    current_clock_in, current_clock_out, current_pause_intervals,
    requested_clock_in, requested_clock_out, requested_pause_intervals,
    reason, status, reviewer_id, reviewed_at, admin_notes, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: String,
    subject_id: String,
    target_session_id: Option<String>,
    request_date: String,
    issue_type: String,
    current_clock_in: Option<String>,
    current_clock_out: Option<String>,
    current_pause_intervals: Option<String>,
    requested_clock_in: Option<String>,
    requested_clock_out: Option<String>,
    requested_pause_intervals: Option<String>,
    reason: String,
    status: String,
    reviewer_id: Option<String>,
    reviewed_at: Option<String>,
    admin_notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RequestRow {
    fn into_request(self, tz: FixedOffset) -> Result<CorrectionRequest, AppError> {
        let ts = |raw: Option<&str>, column: &str| parse_optional_timestamp(raw, tz, column);
        let pauses = |raw: Option<&str>| -> Result<Option<Vec<PauseInterval>>, AppError> {
            raw.map(|value| decode_pauses(value, tz)).transpose()
        };

        Ok(CorrectionRequest {
            request_date: parse_date(&self.request_date, "request_date")?,
            issue_type: parse_enum(&self.issue_type)?,
            current_clock_in: ts(self.current_clock_in.as_deref(), "current_clock_in")?,
            current_clock_out: ts(self.current_clock_out.as_deref(), "current_clock_out")?,
            current_pause_intervals: pauses(self.current_pause_intervals.as_deref())?,
            requested_clock_in: ts(self.requested_clock_in.as_deref(), "requested_clock_in")?,
            requested_clock_out: ts(self.requested_clock_out.as_deref(), "requested_clock_out")?,
            requested_pause_intervals: pauses(self.requested_pause_intervals.as_deref())?,
            status: parse_enum(&self.status)?,
            reviewed_at: ts(self.reviewed_at.as_deref(), "reviewed_at")?,
            created_at: parse_timestamp(&self.created_at, tz, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, tz, "updated_at")?,
            id: self.id,
            subject_id: self.subject_id,
            target_session_id: self.target_session_id,
            reason: self.reason,
            reviewer_id: self.reviewer_id,
            admin_notes: self.admin_notes,
        })
    }
}

fn encode_optional_pauses(pauses: Option<&[PauseInterval]>) -> Result<Option<String>, AppError> {
    pauses.map(encode_pauses).transpose()
}

/// (subject, 날짜)의 대기 중인 요청
pub async fn find_pending_request(
    conn: &mut SqliteConnection,
    subject_id: &str,
    request_date: NaiveDate,
    tz: FixedOffset,
) -> Result<Option<CorrectionRequest>, AppError> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM correction_requests
         WHERE subject_id = ? AND request_date = ? AND status = 'pending'"
    );
    let row = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(subject_id)
        .bind(request_date.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|r| r.into_request(tz)).transpose()
}

/// 새 정정 요청을 저장합니다.
///
/// 같은 (subject, 날짜)에 대기 중인 요청이 있으면 `DuplicatePendingRequest`.
pub async fn insert_request(
    conn: &mut SqliteConnection,
    request: &CorrectionRequest,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO correction_requests (
            id, subject_id, target_session_id, request_date, issue_type,
            current_clock_in, current_clock_out, current_pause_intervals,
            requested_clock_in, requested_clock_out, requested_pause_intervals,
            reason, status, reviewer_id, reviewed_at, admin_notes, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&request.id)
    .bind(&request.subject_id)
    .bind(&request.target_session_id)
    .bind(request.request_date.to_string())
    .bind(request.issue_type.as_str())
    .bind(request.current_clock_in.map(format_timestamp))
    .bind(request.current_clock_out.map(format_timestamp))
    .bind(encode_optional_pauses(request.current_pause_intervals.as_deref())?)
    .bind(request.requested_clock_in.map(format_timestamp))
    .bind(request.requested_clock_out.map(format_timestamp))
    .bind(encode_optional_pauses(request.requested_pause_intervals.as_deref())?)
    .bind(&request.reason)
    .bind(request.status.as_str())
    .bind(&request.reviewer_id)
    .bind(request.reviewed_at.map(format_timestamp))
    .bind(&request.admin_notes)
    .bind(format_timestamp(request.created_at))
    .bind(format_timestamp(request.updated_at))
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(AppError::DuplicatePendingRequest),
        Err(e) => Err(e.into()),
    }
}

pub async fn get_request(
    conn: &mut SqliteConnection,
    id: &str,
    tz: FixedOffset,
) -> Result<Option<CorrectionRequest>, AppError> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM correction_requests WHERE id = ?");
    let row = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|r| r.into_request(tz)).transpose()
}

/// 요청 목록 조회 조건
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub subject_id: Option<String>,
    pub status: Option<CorrectionStatus>,
    pub limit: i64,
    pub skip: i64,
}

/// 조건에 맞는 요청을 최신순으로 조회합니다.
pub async fn list_requests(
    conn: &mut SqliteConnection,
    filter: &RequestFilter,
    tz: FixedOffset,
) -> Result<Vec<CorrectionRequest>, AppError> {
    let mut sql = format!("SELECT {REQUEST_COLUMNS} FROM correction_requests WHERE 1 = 1");
    let mut bindings: Vec<String> = Vec::new();

    if let Some(subject_id) = &filter.subject_id {
        sql.push_str(" AND subject_id = ?");
        bindings.push(subject_id.clone());
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        bindings.push(status.as_str().to_string());
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");

    let mut query = sqlx::query_as::<_, RequestRow>(&sql);
    for binding in bindings {
        query = query.bind(binding);
    }
    let rows = query
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(|r| r.into_request(tz)).collect()
}

/// 요청을 승인/반려 상태로 표시합니다.
///
/// `status = 'pending'`인 행만 바꿉니다. 그 사이 다른 관리자가 먼저 처리했다면
/// 0행이 바뀌고 `Conflict`를 돌려줍니다.
/// `target_session_id`가 주어지면(승인으로 새 세션이 생긴 경우) 함께 채웁니다.
pub async fn mark_reviewed(
    conn: &mut SqliteConnection,
    id: &str,
    status: CorrectionStatus,
    reviewer_id: &str,
    reviewed_at: DateTime<Utc>,
    admin_notes: Option<&str>,
    target_session_id: Option<&str>,
) -> Result<(), AppError> {
    let reviewed_at = format_timestamp(reviewed_at);
    let result = sqlx::query(
        r#"
        UPDATE correction_requests
        SET status = ?, reviewer_id = ?, reviewed_at = ?, admin_notes = ?,
            target_session_id = COALESCE(?, target_session_id), updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(status.as_str())
    .bind(reviewer_id)
    .bind(&reviewed_at)
    .bind(admin_notes)
    .bind(target_session_id)
    .bind(&reviewed_at)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(format!(
            "correction request {id} is no longer pending"
        )));
    }
    Ok(())
}
