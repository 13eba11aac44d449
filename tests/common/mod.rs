#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use timecard::db;
use timecard::models::Actor;
use timecard::routes::AppState;
use timecard::services::time_math::local_instant;
use timecard::services::{
    Clock, CorrectionWorkflow, ManualClock, ReconciliationJob, TracingNotifier, TrackerEngine,
};

pub const JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    pub pool: SqlitePool,
    pub clock: Arc<ManualClock>,
    pub tracker: TrackerEngine,
    pub corrections: CorrectionWorkflow,
    pub reconciliation: ReconciliationJob,
}

impl TestApp {
    pub fn state(&self) -> AppState {
        AppState {
            pool: self.pool.clone(),
            tracker: self.tracker.clone(),
            corrections: self.corrections.clone(),
            reconciliation: self.reconciliation.clone(),
            jwt_secret: JWT_SECRET.to_string(),
        }
    }

    /// 업무 시간대 기준 `date h:m`으로 시계를 맞춥니다.
    pub fn set_time(&self, date: NaiveDate, h: u32, m: u32) {
        self.clock.set(at(date, h, m));
    }
}

pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 업무 시간대(IST)의 벽시계 시각 → UTC
pub fn at(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
    local_instant(ist(), date, NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

pub fn employee(id: &str) -> Actor {
    Actor::employee(id)
}

pub fn admin(id: &str) -> Actor {
    Actor::admin(id)
}

/// 마이그레이션을 적용한 인메모리 DB와, 2025-03-10 09:00 IST에 멈춘 시계
pub async fn setup() -> TestApp {
    // 인메모리 DB는 연결마다 따로 생기므로 연결 하나만 계속 씁니다.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    with_pool(pool).await
}

/// 임시 파일 DB. 여러 연결이 실제로 동시에 쓰는 경우를 시험할 때 씁니다.
/// 끝나면 `remove_db_files`로 지웁니다.
pub async fn setup_on_disk(max_connections: u32) -> (TestApp, PathBuf) {
    let path = std::env::temp_dir().join(format!("timecard-test-{}.db", db::new_id()));
    let url = format!("sqlite://{}", path.display());
    let pool = db::connect(&url, max_connections)
        .await
        .expect("file database");
    (with_pool(pool).await, path)
}

pub async fn remove_db_files(app: TestApp, path: PathBuf) {
    app.pool.close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

async fn with_pool(pool: SqlitePool) -> TestApp {
    db::run_migrations(&pool).await.expect("migrations");

    let clock = Arc::new(ManualClock::new(at(day(2025, 3, 10), 9, 0), ist()));
    let shared: Arc<dyn Clock> = clock.clone();

    TestApp {
        tracker: TrackerEngine::new(pool.clone(), shared.clone()),
        corrections: CorrectionWorkflow::new(pool.clone(), shared.clone(), Arc::new(TracingNotifier)),
        reconciliation: ReconciliationJob::new(
            pool.clone(),
            shared,
            NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
        ),
        pool,
        clock,
    }
}
