//! # 근태 세션 데이터베이스 쿼리 모듈
//!
//! `tracking_sessions` 테이블을 다루는 SQL 쿼리 함수들입니다.
//!
//! ## 동시성 규칙
//! - "진행 중인 세션은 (subject, 업무일)마다 하나" 규칙은 부분 UNIQUE 인덱스
//!   (`idx_tracking_sessions_one_open`)가 지킵니다. 동시에 두 번 출근해도
//!   INSERT 하나는 반드시 실패하고, 그 실패를 `AlreadyClockedIn`으로 바꿔 돌려줍니다.
//! - 세션 수정은 `update_atomic` 한 곳으로만 합니다. 읽은 시점의 `version`이
//!   그대로일 때만 UPDATE가 적용되고, 아니면 `Conflict`를 돌려줍니다.

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use super::{format_timestamp, parse_date, parse_enum, parse_optional_timestamp, parse_timestamp};
use crate::error::AppError;
use crate::models::{PauseInterval, SessionStatus, TrackingSession};

/// SELECT에서 공통으로 쓰는 컬럼 목록
const SESSION_COLUMNS: &str = r#"
    id, subject_id, business_date, clock_in, clock_out, pause_intervals, status,
    total_work_seconds, total_pause_seconds, version, created_at, updated_at
"#;

/// DB 한 행 그대로의 모양 (시각은 문자열)
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    subject_id: String,
    business_date: String,
    clock_in: String,
    clock_out: Option<String>,
    pause_intervals: String,
    status: String,
    total_work_seconds: i64,
    total_pause_seconds: i64,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    /// 문자열 컬럼을 도메인 타입으로 변환합니다.
    /// 오프셋 없이 저장된 시각은 `tz`(업무 시간대) 기준으로 해석됩니다.
    fn into_session(self, tz: FixedOffset) -> Result<TrackingSession, AppError> {
        Ok(TrackingSession {
            business_date: parse_date(&self.business_date, "business_date")?,
            clock_in: parse_timestamp(&self.clock_in, tz, "clock_in")?,
            clock_out: parse_optional_timestamp(self.clock_out.as_deref(), tz, "clock_out")?,
            pause_intervals: decode_pauses(&self.pause_intervals, tz)?,
            status: parse_enum(&self.status)?,
            total_work_seconds: self.total_work_seconds,
            total_pause_seconds: self.total_pause_seconds,
            version: self.version,
            created_at: parse_timestamp(&self.created_at, tz, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, tz, "updated_at")?,
            id: self.id,
            subject_id: self.subject_id,
        })
    }
}

/// 휴식 구간의 저장 형식: `[{"pause_start": "...", "pause_end": "..." | null}]`
#[derive(Debug, Serialize, Deserialize)]
struct StoredPause {
    pause_start: String,
    pause_end: Option<String>,
}

pub(crate) fn encode_pauses(pauses: &[PauseInterval]) -> Result<String, AppError> {
    let stored: Vec<StoredPause> = pauses
        .iter()
        .map(|p| StoredPause {
            pause_start: format_timestamp(p.start),
            pause_end: p.end.map(format_timestamp),
        })
        .collect();
    Ok(serde_json::to_string(&stored)?)
}

pub(crate) fn decode_pauses(raw: &str, tz: FixedOffset) -> Result<Vec<PauseInterval>, AppError> {
    let stored: Vec<StoredPause> = serde_json::from_str(raw)?;
    stored
        .into_iter()
        .map(|p| {
            Ok(PauseInterval {
                start: parse_timestamp(&p.pause_start, tz, "pause_start")?,
                end: parse_optional_timestamp(p.pause_end.as_deref(), tz, "pause_end")?,
            })
        })
        .collect()
}

/// `sqlx::Error`가 UNIQUE 제약 위반인지 확인합니다.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// ID로 세션 하나를 조회합니다.
pub async fn get_session(
    conn: &mut SqliteConnection,
    id: &str,
    tz: FixedOffset,
) -> Result<Option<TrackingSession>, AppError> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM tracking_sessions WHERE id = ?");
    let row = sqlx::query_as::<_, SessionRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|r| r.into_session(tz)).transpose()
}

/// (subject, 업무일)의 진행 중(ACTIVE/PAUSED) 세션을 조회합니다.
/// UNIQUE 인덱스 덕분에 결과는 최대 한 행입니다.
pub async fn find_open_session(
    conn: &mut SqliteConnection,
    subject_id: &str,
    business_date: NaiveDate,
    tz: FixedOffset,
) -> Result<Option<TrackingSession>, AppError> {
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM tracking_sessions
         WHERE subject_id = ? AND business_date = ? AND status IN ('active', 'paused')"
    );
    let row = sqlx::query_as::<_, SessionRow>(&sql)
        .bind(subject_id)
        .bind(business_date.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|r| r.into_session(tz)).transpose()
}

/// 세션 목록 조회 조건. 비어 있는 조건은 적용하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub subject_id: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub statuses: Vec<SessionStatus>,
}

/// 조건에 맞는 세션을 업무일, 출근 시각 순으로 조회합니다.
pub async fn find_by_date_range(
    conn: &mut SqliteConnection,
    filter: &SessionFilter,
    tz: FixedOffset,
) -> Result<Vec<TrackingSession>, AppError> {
    // 조건에 따라 WHERE 절을 동적으로 조립합니다.
    let mut sql = format!("SELECT {SESSION_COLUMNS} FROM tracking_sessions WHERE 1 = 1");
    let mut bindings: Vec<String> = Vec::new();

    if let Some(subject_id) = &filter.subject_id {
        sql.push_str(" AND subject_id = ?");
        bindings.push(subject_id.clone());
    }
    if let Some(start) = filter.start {
        sql.push_str(" AND business_date >= ?");
        bindings.push(start.to_string());
    }
    if let Some(end) = filter.end {
        sql.push_str(" AND business_date <= ?");
        bindings.push(end.to_string());
    }
    if !filter.statuses.is_empty() {
        let placeholders = vec!["?"; filter.statuses.len()].join(", ");
        sql.push_str(&format!(" AND status IN ({placeholders})"));
        bindings.extend(filter.statuses.iter().map(|s| s.as_str().to_string()));
    }
    sql.push_str(" ORDER BY business_date ASC, clock_in ASC");

    let mut query = sqlx::query_as::<_, SessionRow>(&sql);
    for binding in bindings {
        query = query.bind(binding);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    rows.into_iter().map(|r| r.into_session(tz)).collect()
}

/// 한 사용자의 특정 업무일 세션 전체 (상태 무관)
pub async fn list_sessions_for_date(
    conn: &mut SqliteConnection,
    subject_id: &str,
    business_date: NaiveDate,
    tz: FixedOffset,
) -> Result<Vec<TrackingSession>, AppError> {
    let filter = SessionFilter {
        subject_id: Some(subject_id.to_string()),
        start: Some(business_date),
        end: Some(business_date),
        statuses: Vec::new(),
    };
    find_by_date_range(conn, &filter, tz).await
}

/// 새 세션을 저장합니다.
///
/// 같은 (subject, 업무일)에 진행 중인 세션이 이미 있으면 UNIQUE 인덱스 위반으로
/// `AlreadyClockedIn`을 돌려줍니다. 애플리케이션 쪽 사전 검사와 무관하게
/// 저장소가 최종 판정을 내립니다.
pub async fn create_session(
    conn: &mut SqliteConnection,
    session: &TrackingSession,
) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO tracking_sessions (
            id, subject_id, business_date, clock_in, clock_out, pause_intervals, status,
            total_work_seconds, total_pause_seconds, version, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(&session.subject_id)
    .bind(session.business_date.to_string())
    .bind(format_timestamp(session.clock_in))
    .bind(session.clock_out.map(format_timestamp))
    .bind(encode_pauses(&session.pause_intervals)?)
    .bind(session.status.as_str())
    .bind(session.total_work_seconds)
    .bind(session.total_pause_seconds)
    .bind(session.version)
    .bind(format_timestamp(session.created_at))
    .bind(format_timestamp(session.updated_at))
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(AppError::AlreadyClockedIn),
        Err(e) => Err(e.into()),
    }
}

/// 세션을 원자적으로 읽고-고치고-씁니다.
///
/// 1. 최신 행을 읽어 `mutate`에 넘깁니다. `mutate`가 에러를 내면 아무것도 쓰지 않습니다.
/// 2. `WHERE id = ? AND version = ?`로 UPDATE 하고 version을 1 올립니다.
/// 3. 그 사이 다른 쓰기가 끼어들어 0행이 바뀌었으면 `Conflict`를 돌려줍니다.
///    재시도 여부는 호출자(`services::retry_on_conflict`)가 정합니다.
///
/// `business_date`, `subject_id`, `created_at`은 바뀌지 않습니다.
pub async fn update_atomic<F>(
    conn: &mut SqliteConnection,
    id: &str,
    tz: FixedOffset,
    mutate: F,
) -> Result<TrackingSession, AppError>
where
    F: FnOnce(&mut TrackingSession) -> Result<(), AppError>,
{
    let mut session = get_session(&mut *conn, id, tz)
        .await?
        .ok_or(AppError::NotFound)?;
    let expected_version = session.version;

    mutate(&mut session)?;

    let result = sqlx::query(
        r#"
        UPDATE tracking_sessions
        SET clock_in = ?, clock_out = ?, pause_intervals = ?, status = ?,
            total_work_seconds = ?, total_pause_seconds = ?,
            version = version + 1, updated_at = ?
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(format_timestamp(session.clock_in))
    .bind(session.clock_out.map(format_timestamp))
    .bind(encode_pauses(&session.pause_intervals)?)
    .bind(session.status.as_str())
    .bind(session.total_work_seconds)
    .bind(session.total_pause_seconds)
    .bind(format_timestamp(session.updated_at))
    .bind(id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await;

    let result = match result {
        Ok(result) => result,
        Err(e) if is_unique_violation(&e) => return Err(AppError::AlreadyClockedIn),
        Err(e) => return Err(e.into()),
    };

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(format!(
            "session {id} changed since version {expected_version}"
        )));
    }

    session.version = expected_version + 1;
    Ok(session)
}

/// 자동 퇴근 대상 세션의 키.
/// 본문(휴식 구간 등)은 세션별 트랜잭션 안에서 `update_atomic`이 읽습니다.
/// 그래서 한 행이 깨져 있어도 그 세션만 실패하고 나머지는 처리됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSessionKey {
    pub id: String,
    pub subject_id: String,
    pub business_date: NaiveDate,
}

#[derive(Debug, sqlx::FromRow)]
struct OpenSessionKeyRow {
    id: String,
    subject_id: String,
    business_date: String,
}

/// 업무일 목록에 걸친 진행 중 세션의 키 (자동 퇴근 처리용)
pub async fn list_open_sessions_for_dates(
    conn: &mut SqliteConnection,
    dates: &[NaiveDate],
) -> Result<Vec<OpenSessionKey>, AppError> {
    if dates.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; dates.len()].join(", ");
    let sql = format!(
        "SELECT id, subject_id, business_date FROM tracking_sessions
         WHERE status IN ('active', 'paused') AND business_date IN ({placeholders})
         ORDER BY business_date ASC, clock_in ASC"
    );

    let mut query = sqlx::query_as::<_, OpenSessionKeyRow>(&sql);
    for date in dates {
        query = query.bind(date.to_string());
    }
    let rows = query.fetch_all(&mut *conn).await?;

    rows.into_iter()
        .map(|r| {
            Ok(OpenSessionKey {
                business_date: parse_date(&r.business_date, "business_date")?,
                id: r.id,
                subject_id: r.subject_id,
            })
        })
        .collect()
}

/// 세션 시각 스냅샷을 감사 로그용 JSON으로 만듭니다.
pub fn snapshot_json(session: &TrackingSession) -> Result<serde_json::Value, AppError> {
    Ok(serde_json::to_value(session.snapshot())?)
}

