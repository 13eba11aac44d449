//! # timecard 웹 서버 진입점
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. 설정 로딩
//! 4. SQLite 연결 풀 생성과 마이그레이션
//! 5. 서비스(근태 엔진, 정정 워크플로우, 자동 퇴근 작업) 조립
//! 6. 자동 퇴근 스케줄러 시작
//! 7. HTTP 서버 시작, Ctrl+C에서 정상 종료

use anyhow::Result; // main에서는 어떤 에러든 담을 수 있는 anyhow::Result를 씁니다.
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timecard::{
    config::Config,
    db,
    routes::{self, AppState},
    services::{
        Clock, CorrectionWorkflow, ReconciliationJob, ReconciliationScheduler, SystemClock,
        TracingNotifier, TrackerEngine,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅 초기화 ──
    // RUST_LOG가 없으면 timecard, tower_http, axum 모듈을 debug 레벨로 봅니다.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timecard=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 3단계: 설정 로딩 ──
    let config = Config::from_env()?;
    tracing::info!(
        "Starting timecard server on {}:{} (business offset {}, cutoff {})",
        config.host,
        config.port,
        config.business_tz,
        config.reconcile_cutoff
    );

    // ── 4단계: 연결 풀과 마이그레이션 ──
    let pool = db::connect(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // ── 5단계: 서비스 조립 ──
    // 모든 서비스가 같은 시계(업무 시간대 포함)를 공유합니다.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.business_tz));
    let tracker = TrackerEngine::new(pool.clone(), clock.clone());
    let corrections =
        CorrectionWorkflow::new(pool.clone(), clock.clone(), Arc::new(TracingNotifier));
    let reconciliation = ReconciliationJob::new(pool.clone(), clock, config.reconcile_cutoff);

    // ── 6단계: 자동 퇴근 스케줄러 ──
    let scheduler = if config.reconcile_enabled {
        Some(ReconciliationScheduler::spawn(reconciliation.clone()))
    } else {
        tracing::warn!("Daily reconciliation is disabled (RECONCILE_ENABLED=false)");
        None
    };

    let state = AppState {
        pool,
        tracker,
        corrections,
        reconciliation,
        jwt_secret: config.jwt_secret.clone(),
    };
    let app = routes::build_router(state);

    // ── 7단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

/// Ctrl+C를 기다립니다.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
