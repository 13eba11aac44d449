//! 정정 요청 처리 결과 알림.
//!
//! 실제 메일/메신저 발송은 이 서비스 밖의 일입니다. 알림은 best-effort이고
//! 실패해도 승인/반려 결과에는 영향을 주지 않습니다.

use crate::models::CorrectionRequest;

pub trait Notifier: Send + Sync {
    fn correction_reviewed(&self, request: &CorrectionRequest);
}

/// 알림 대신 구조화된 로그를 남기는 기본 구현
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn correction_reviewed(&self, request: &CorrectionRequest) {
        tracing::info!(
            request_id = %request.id,
            subject_id = %request.subject_id,
            status = %request.status,
            reviewer_id = request.reviewer_id.as_deref().unwrap_or("-"),
            "correction request reviewed"
        );
    }
}
