//! # 비즈니스 로직 계층
//!
//! 라우트 핸들러와 DB 접근 계층 사이에서 근태 규칙을 담당합니다.
//!
//! - `time_math`: 근무/휴식 시간 계산, 시각 정규화 (순수 함수)
//! - `clock`: 현재 시각/업무 시간대 제공
//! - `tracker`: 출근 → 휴식 → 복귀 → 퇴근 상태 머신
//! - `reconciliation`: 퇴근을 잊은 세션을 매일 자동으로 닫는 작업
//! - `corrections`: 정정 요청 제출/승인/반려 워크플로우
//! - `notify`: 처리 결과 알림

pub mod clock;
pub mod corrections;
pub mod notify;
pub mod reconciliation;
pub mod time_math;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use corrections::CorrectionWorkflow;
pub use notify::{Notifier, TracingNotifier};
pub use reconciliation::{ReconciliationJob, ReconciliationScheduler, ReconciliationSummary};
pub use tracker::TrackerEngine;

use std::future::Future;

use crate::error::AppError;

/// 낙관적 동시성 충돌(`Conflict`)이면 한 번만 다시 시도합니다.
///
/// 두 번째도 충돌하면 그대로 돌려주고, 라우트 계층에서 503이 됩니다.
/// 다른 에러는 재시도하지 않습니다.
pub async fn retry_on_conflict<T, F, Fut>(operation: &str, mut attempt: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    match attempt().await {
        Err(AppError::Conflict(reason)) => {
            tracing::warn!(operation, %reason, "version conflict, retrying once");
            attempt().await
        }
        other => other,
    }
}
