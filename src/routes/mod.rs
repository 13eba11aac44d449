//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들을 모아둔 모듈입니다.
//! 핸들러는 요청을 해석하고 서비스 계층을 부른 뒤, 결과를 JSON으로 돌려주기만 합니다.
//! 근태 규칙은 모두 `services/`에 있습니다.
//!
//! 각 하위 모듈:
//! - `tracker`: 출근/휴식/복귀/퇴근과 본인 세션 조회
//! - `corrections`: 정정 요청 제출과 조회
//! - `admin`: 관리자용 세션 조회, 정정 요청 승인/반려, 자동 퇴근 수동 실행
//! - `health`: 서버 상태 확인 (헬스체크)

pub mod admin;
pub mod corrections;
pub mod health;
pub mod tracker;

use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::services::{CorrectionWorkflow, ReconciliationJob, TrackerEngine};

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// 서비스들은 내부적으로 풀과 시계를 `Arc`로 공유하므로 clone 비용이 작습니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀 (헬스체크용)
    pub pool: SqlitePool,
    pub tracker: TrackerEngine,
    pub corrections: CorrectionWorkflow,
    pub reconciliation: ReconciliationJob,
    /// 토큰 서명 검증용 비밀키
    pub jwt_secret: String,
}

/// `/api/v1` 아래의 모든 라우트와 미들웨어를 조립합니다.
pub fn build_router(state: AppState) -> Router {
    let tracker_routes = Router::new()
        .route("/tracker/clock-in", post(tracker::clock_in))
        .route("/tracker/pause", post(tracker::pause))
        .route("/tracker/resume", post(tracker::resume))
        .route("/tracker/clock-out", post(tracker::clock_out))
        .route("/tracker/current", get(tracker::current))
        .route("/tracker/history", get(tracker::history))
        .route("/tracker/by-date", get(tracker::by_date));

    let correction_routes = Router::new()
        .route("/time-corrections", post(corrections::submit))
        .route("/time-corrections/me", get(corrections::my_requests))
        .route("/time-corrections/{id}", get(corrections::detail))
        .route("/time-corrections/{id}/logs", get(corrections::logs));

    let admin_routes = Router::new()
        .route("/admin/tracker", get(admin::list_sessions))
        .route("/admin/time-corrections", get(admin::list_requests))
        .route("/admin/time-corrections/{id}/approve", patch(admin::approve))
        .route("/admin/time-corrections/{id}/reject", patch(admin::reject))
        .route("/admin/reconciliation/run", post(admin::run_reconciliation));

    let api_routes = Router::new()
        .merge(tracker_routes)
        .merge(correction_routes)
        .merge(admin_routes)
        .route("/health", get(health::health_check))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
