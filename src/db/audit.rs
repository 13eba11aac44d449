//! # 감사 로그 쿼리 모듈
//!
//! `audit_entries`는 추가만 할 수 있습니다. UPDATE/DELETE는 DB 트리거가 거부하므로
//! 이 모듈에도 수정/삭제 함수는 없습니다.

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::SqliteConnection;

use super::{format_timestamp, new_id, parse_enum, parse_timestamp};
use crate::error::AppError;
use crate::models::{AuditEntry, NewAuditEntry};

const AUDIT_COLUMNS: &str = r#"
    id, request_id, session_id, action, performed_by, old_values, new_values, notes, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    request_id: Option<String>,
    session_id: Option<String>,
    action: String,
    performed_by: String,
    old_values: Option<String>,
    new_values: Option<String>,
    notes: Option<String>,
    created_at: String,
}

impl AuditRow {
    fn into_entry(self, tz: FixedOffset) -> Result<AuditEntry, AppError> {
        let json = |raw: Option<String>| -> Result<Option<serde_json::Value>, AppError> {
            Ok(raw.map(|value| serde_json::from_str(&value)).transpose()?)
        };

        Ok(AuditEntry {
            action: parse_enum(&self.action)?,
            old_values: json(self.old_values)?,
            new_values: json(self.new_values)?,
            created_at: parse_timestamp(&self.created_at, tz, "created_at")?,
            id: self.id,
            request_id: self.request_id,
            session_id: self.session_id,
            performed_by: self.performed_by,
            notes: self.notes,
        })
    }
}

/// 감사 로그 한 줄을 추가합니다.
pub async fn append_audit(
    conn: &mut SqliteConnection,
    entry: NewAuditEntry,
    at: DateTime<Utc>,
) -> Result<AuditEntry, AppError> {
    let id = new_id();
    let old_values = entry.old_values.as_ref().map(serde_json::to_string).transpose()?;
    let new_values = entry.new_values.as_ref().map(serde_json::to_string).transpose()?;

    sqlx::query(
        r#"
        INSERT INTO audit_entries (
            id, request_id, session_id, action, performed_by,
            old_values, new_values, notes, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&entry.request_id)
    .bind(&entry.session_id)
    .bind(entry.action.as_str())
    .bind(&entry.performed_by)
    .bind(old_values)
    .bind(new_values)
    .bind(&entry.notes)
    .bind(format_timestamp(at))
    .execute(&mut *conn)
    .await?;

    Ok(AuditEntry {
        id,
        request_id: entry.request_id,
        session_id: entry.session_id,
        action: entry.action,
        performed_by: entry.performed_by,
        old_values: entry.old_values,
        new_values: entry.new_values,
        notes: entry.notes,
        created_at: at,
    })
}

/// 정정 요청 하나에 대한 기록 (오래된 것부터)
pub async fn list_audit_for_request(
    conn: &mut SqliteConnection,
    request_id: &str,
    tz: FixedOffset,
) -> Result<Vec<AuditEntry>, AppError> {
    let sql = format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_entries WHERE request_id = ? ORDER BY created_at ASC, id ASC"
    );
    let rows = sqlx::query_as::<_, AuditRow>(&sql)
        .bind(request_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(|r| r.into_entry(tz)).collect()
}

/// 세션 하나에 대한 기록 (오래된 것부터)
pub async fn list_audit_for_session(
    conn: &mut SqliteConnection,
    session_id: &str,
    tz: FixedOffset,
) -> Result<Vec<AuditEntry>, AppError> {
    let sql = format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_entries WHERE session_id = ? ORDER BY created_at ASC, id ASC"
    );
    let rows = sqlx::query_as::<_, AuditRow>(&sql)
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(|r| r.into_entry(tz)).collect()
}
