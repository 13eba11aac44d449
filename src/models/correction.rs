//! # 근태 정정 요청 모델
//!
//! 직원이 "출근/퇴근 기록을 고쳐 달라"고 올리는 요청과,
//! 관리자의 승인/반려에 쓰이는 구조체들입니다.
//!
//! 요청 상태는 `pending → approved | rejected` 한 방향으로만 움직입니다.
//! 한 번 처리된 요청은 다시 처리할 수 없습니다.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PauseInterval;

/// 정정 사유 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    MissedClockIn,
    MissedClockOut,
    WrongTime,
    ForgotResume,
    MissedPunch,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::MissedClockIn => "missed_clock_in",
            IssueType::MissedClockOut => "missed_clock_out",
            IssueType::WrongTime => "wrong_time",
            IssueType::ForgotResume => "forgot_resume",
            IssueType::MissedPunch => "missed_punch",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "missed_clock_in" => Ok(IssueType::MissedClockIn),
            "missed_clock_out" => Ok(IssueType::MissedClockOut),
            "wrong_time" => Ok(IssueType::WrongTime),
            "forgot_resume" => Ok(IssueType::ForgotResume),
            "missed_punch" => Ok(IssueType::MissedPunch),
            other => Err(format!("unknown issue type: {other}")),
        }
    }
}

/// 정정 요청 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    Pending,
    Approved,
    Rejected,
}

impl CorrectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionStatus::Pending => "pending",
            CorrectionStatus::Approved => "approved",
            CorrectionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CorrectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(CorrectionStatus::Pending),
            "approved" => Ok(CorrectionStatus::Approved),
            "rejected" => Ok(CorrectionStatus::Rejected),
            other => Err(format!("unknown correction status: {other}")),
        }
    }
}

/// 정정 요청 엔티티 (`correction_requests` 테이블 한 행)
///
/// `current_*`는 요청 시점의 대상 세션 값(스냅샷)이고,
/// `requested_*`는 직원이 제안한 값입니다. 제안하지 않은 필드는 None으로 남고,
/// 승인 시 세션의 해당 필드는 그대로 유지됩니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionRequest {
    pub id: String,
    pub subject_id: String,
    /// 승인 시 새 세션이 만들어지면 그 세션 ID로 채워집니다.
    pub target_session_id: Option<String>,
    pub request_date: NaiveDate,
    pub issue_type: IssueType,
    pub current_clock_in: Option<DateTime<Utc>>,
    pub current_clock_out: Option<DateTime<Utc>>,
    pub current_pause_intervals: Option<Vec<PauseInterval>>,
    pub requested_clock_in: Option<DateTime<Utc>>,
    pub requested_clock_out: Option<DateTime<Utc>>,
    pub requested_pause_intervals: Option<Vec<PauseInterval>>,
    pub reason: String,
    pub status: CorrectionStatus,
    pub reviewer_id: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 직원이 제안하는 휴식 구간 (요청 본문)
///
/// 시각은 문자열로 받아서 서비스 계층에서 정규화합니다.
/// 저장 형식과 같은 `pause_start`/`pause_end` 키도 받습니다.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestedPause {
    #[serde(alias = "pause_start")]
    pub start: Option<String>,
    #[serde(alias = "pause_end")]
    pub end: Option<String>,
}

/// `POST /time-corrections` 요청 본문
///
/// 시각 문자열에 오프셋이 없으면 업무 시간대 기준으로 해석합니다.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitCorrectionRequest {
    pub request_date: NaiveDate,
    /// 생략하면 해당 날짜의 세션을 찾아 씁니다.
    pub target_session_id: Option<String>,
    pub issue_type: IssueType,
    pub requested_clock_in: Option<String>,
    pub requested_clock_out: Option<String>,
    pub requested_pause_intervals: Option<Vec<RequestedPause>>,
    pub reason: String,
}

/// 승인/반려 요청 본문
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewRequest {
    pub admin_notes: Option<String>,
}

/// 정정 요청 목록 조회 쿼리 파라미터
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorrectionListQuery {
    pub status: Option<CorrectionStatus>,
    /// 관리자 목록에서만 의미가 있습니다.
    pub user_id: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}
