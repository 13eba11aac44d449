//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 서비스 계층(services/)이 이 모듈의 함수를 호출하여 DB 작업을 수행합니다.
//!
//! 각 하위 모듈:
//! - `sessions`: 근태 세션 조회/생성, 버전 검사를 거친 원자적 수정(`update_atomic`)
//! - `corrections`: 정정 요청 저장/조회/처리 표시
//! - `audit`: 감사 로그 추가/조회 (수정/삭제는 DB 트리거가 막음)
//!
//! ## 연결(connection) 다루기
//! 모든 함수는 `&mut SqliteConnection`을 받습니다. 풀에서 빌린 연결(`pool.acquire()`)과
//! 트랜잭션(`pool.begin()`) 모두 `&mut *conn` / `&mut tx`로 넘길 수 있어서,
//! 같은 함수를 트랜잭션 안팎에서 그대로 씁니다.
//!
//! ## 시각 저장 형식
//! 모든 시각은 UTC ISO-8601 문자열(`2025-03-10T03:30:00.000000Z`)로 저장합니다.
//! 읽을 때는 `time_math::normalize_timestamp`를 거치므로, 오프셋 없이 저장된
//! 옛 데이터도 업무 시간대 기준으로 해석됩니다.

pub mod audit;
pub mod corrections;
pub mod sessions;

pub use audit::*;
pub use corrections::*;
pub use sessions::*;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::AppError;
use crate::services::time_math;

/// UTC 시각 → 저장용 문자열
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// 저장된 시각 문자열 → UTC 시각
///
/// 해석할 수 없는 값은 저장소가 깨진 것이므로 내부 오류로 돌려줍니다.
pub fn parse_timestamp(
    raw: &str,
    tz: FixedOffset,
    column: &str,
) -> Result<DateTime<Utc>, AppError> {
    time_math::normalize_timestamp(raw, tz)
        .ok_or_else(|| AppError::Internal(format!("unreadable timestamp in {column}: {raw:?}")))
}

pub fn parse_optional_timestamp(
    raw: Option<&str>,
    tz: FixedOffset,
    column: &str,
) -> Result<Option<DateTime<Utc>>, AppError> {
    raw.map(|value| parse_timestamp(value, tz, column))
        .transpose()
}

pub fn parse_date(raw: &str, column: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Internal(format!("unreadable date in {column}: {raw:?}")))
}

/// 문자열로 저장된 열거형 컬럼 해석
pub(crate) fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> Result<T, AppError> {
    raw.parse().map_err(AppError::Internal)
}

/// 시간 순으로 정렬되는 새 ID (UUIDv7)
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// 연결 풀을 만듭니다. 파일이 없으면 새로 만듭니다.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// 아직 실행되지 않은 마이그레이션을 순서대로 실행합니다.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
