//! # 근태 세션 모델 정의
//!
//! 직원의 출근 ~ 퇴근 한 구간을 나타내는 데이터 구조체들을 정의합니다.
//!
//! ## 세션 상태 흐름
//! ```text
//! (없음) --출근--> ACTIVE --휴식--> PAUSED --복귀--> ACTIVE --퇴근--> COMPLETED
//!                    └──────────────퇴근(휴식 중이어도 가능)──────────────┘
//! ```
//!
//! 세션은 물리적으로 삭제되지 않습니다. 완료된 세션은 급여/근태의 원장(record)입니다.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::services::time_math::{self, Durations};

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, SessionStatus::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "paused" => Ok(SessionStatus::Paused),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// 휴식 구간. `end`가 None이면 아직 진행 중인 휴식입니다.
///
/// 한 세션의 휴식 목록에서 열린 구간은 최대 하나이고, 항상 마지막 원소입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseInterval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl PauseInterval {
    pub fn open(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// 근태 세션 엔티티. `tracking_sessions` 테이블 한 행에 대응합니다.
///
/// DB 행(문자열 컬럼)과의 변환은 `db::sessions`가 담당하고,
/// 이 구조체는 항상 UTC로 정규화된 시각만 담습니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingSession {
    pub id: String,
    /// 세션 소유자(직원) ID
    pub subject_id: String,
    /// 업무 시간대 기준 날짜
    pub business_date: NaiveDate,
    pub clock_in: DateTime<Utc>,
    /// None이면 아직 퇴근하지 않은 세션
    pub clock_out: Option<DateTime<Utc>>,
    pub pause_intervals: Vec<PauseInterval>,
    pub status: SessionStatus,
    /// 캐시된 합계. 변경될 때마다, 그리고 진행 중인 세션은 읽을 때마다 다시 계산합니다.
    pub total_work_seconds: i64,
    pub total_pause_seconds: i64,
    /// 낙관적 동시성 검사용 버전
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackingSession {
    /// 출근 직후의 새 세션 (ACTIVE, 휴식 없음)
    pub fn start(
        id: String,
        subject_id: &str,
        business_date: NaiveDate,
        clock_in: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject_id: subject_id.to_string(),
            business_date,
            clock_in,
            clock_out: None,
            pause_intervals: Vec::new(),
            status: SessionStatus::Active,
            total_work_seconds: 0,
            total_pause_seconds: 0,
            version: 0,
            created_at: clock_in,
            updated_at: clock_in,
        }
    }

    /// 진행 중인 휴식 구간 (있다면 마지막 원소)
    pub fn open_pause(&self) -> Option<&PauseInterval> {
        self.pause_intervals.last().filter(|p| p.is_open())
    }

    /// 열린 휴식 구간을 `at`에 닫습니다. 닫은 구간이 있으면 true.
    ///
    /// `at`이 휴식 시작보다 앞서면 시작 시각에 닫아 `start <= end`를 유지합니다.
    pub fn close_open_pause(&mut self, at: DateTime<Utc>) -> bool {
        match self.pause_intervals.last_mut() {
            Some(last) if last.end.is_none() => {
                last.end = Some(at.max(last.start));
                true
            }
            _ => false,
        }
    }

    /// `now` 기준으로 근무/휴식 시간을 계산합니다. (저장값은 건드리지 않음)
    pub fn durations(&self, now: DateTime<Utc>) -> Durations {
        time_math::compute_durations(self.clock_in, self.clock_out, &self.pause_intervals, Some(now))
    }

    /// 캐시된 합계를 다시 계산해 덮어씁니다.
    pub fn refresh_totals(&mut self, now: DateTime<Utc>) {
        let durations = self.durations(now);
        self.total_work_seconds = durations.work_seconds;
        self.total_pause_seconds = durations.pause_seconds;
    }

    /// 진행 중인 세션이면 합계를 `now` 기준으로 갱신한 복사본을 돌려줍니다.
    /// 완료된 세션은 저장된 합계를 그대로 씁니다.
    pub fn with_live_totals(mut self, now: DateTime<Utc>) -> Self {
        if self.status.is_open() {
            self.refresh_totals(now);
        }
        self
    }

    /// 감사 로그에 남길 변경 전/후 스냅샷
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            clock_in: self.clock_in,
            clock_out: self.clock_out,
            pause_intervals: self.pause_intervals.clone(),
            status: self.status,
            total_work_seconds: self.total_work_seconds,
            total_pause_seconds: self.total_pause_seconds,
        }
    }
}

/// 세션의 시각 관련 필드만 떼어낸 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
    pub pause_intervals: Vec<PauseInterval>,
    pub status: SessionStatus,
    pub total_work_seconds: i64,
    pub total_pause_seconds: i64,
}

/// `GET /tracker/current` 응답
#[derive(Debug, Clone, Serialize)]
pub struct CurrentSession {
    pub has_active_session: bool,
    pub session: Option<TrackingSession>,
    pub current_work_seconds: Option<i64>,
    pub current_pause_seconds: Option<i64>,
}

/// `GET /tracker/history` 쿼리 파라미터
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<SessionStatus>,
}

/// `GET /tracker/by-date` 쿼리 파라미터
#[derive(Debug, Deserialize)]
pub struct ByDateQuery {
    pub date: NaiveDate,
    /// 관리자만 다른 사용자를 지정할 수 있습니다.
    pub user_id: Option<String>,
}

/// `GET /admin/tracker` 쿼리 파라미터
#[derive(Debug, Default, Deserialize)]
pub struct AdminSessionQuery {
    pub user_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<SessionStatus>,
}
