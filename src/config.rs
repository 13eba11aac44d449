//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (필수)
//! - `JWT_SECRET`: Bearer 토큰 검증에 사용할 비밀키 (필수)
//! - `HOST` / `PORT`: 서버 바인딩 주소 (기본값 `0.0.0.0:3000`)
//! - `BUSINESS_UTC_OFFSET`: 업무 기준 시간대의 UTC 오프셋 (기본값 `+05:30`)
//! - `RECONCILE_CUTOFF`: 자동 퇴근 처리 시각, 업무 시간대 기준 `HH:MM` (기본값 `23:00`)
//! - `RECONCILE_ENABLED`: 자동 퇴근 스케줄러 사용 여부 (기본값 `true`)
//! - `DB_MAX_CONNECTIONS`: 연결 풀 크기 (기본값 5)

use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use std::env;
use thiserror::Error;

/// 설정 로딩 실패
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {key}")]
    Missing { key: &'static str },

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// 애플리케이션 전체 설정을 담는 구조체
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/timecard.db")
    pub database_url: String,
    /// 토큰 서명 검증용 비밀키
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    /// 업무 기준 시간대. 업무일(business date) 계산과 오프셋 없는 시각 해석에 쓰입니다.
    pub business_tz: FixedOffset,
    /// 매일 자동 퇴근 처리가 실행되는 시각 (업무 시간대 기준)
    pub reconcile_cutoff: NaiveTime,
    pub reconcile_enabled: bool,
    pub db_max_connections: u32,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수입니다. 나머지는 기본값이 있지만,
    /// 값이 주어졌는데 형식이 틀리면 조용히 기본값을 쓰지 않고 에러를 돌려줍니다.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed("PORT", 3000, |raw| raw.parse().ok())?,
            business_tz: parsed("BUSINESS_UTC_OFFSET", default_business_tz(), parse_utc_offset)?,
            reconcile_cutoff: parsed("RECONCILE_CUTOFF", default_cutoff(), parse_cutoff)?,
            reconcile_enabled: parsed("RECONCILE_ENABLED", true, parse_flag)?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 5, |raw| {
                raw.parse().ok().filter(|n| *n > 0)
            })?,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing { key })
}

/// 선택 항목: 환경변수가 없으면 기본값, 있으면 `parse`로 해석합니다.
fn parsed<T>(
    key: &'static str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse(raw.trim()).ok_or(ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// 인도 표준시(IST, UTC+05:30)
pub fn default_business_tz() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap_or_else(|| Utc.fix())
}

pub fn default_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// UTC 오프셋 문자열을 해석합니다. `+05:30`, `-0800`, `+9`, `Z`, `UTC` 형식을 받습니다.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.chars().next()? {
        '+' => (1, &raw[1..]),
        '-' => (-1, &raw[1..]),
        _ => return None,
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_cutoff(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
