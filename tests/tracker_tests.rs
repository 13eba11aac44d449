mod common;

use common::{at, day, employee, remove_db_files, setup, setup_on_disk};
use timecard::db;
use timecard::error::AppError;
use timecard::models::{HistoryQuery, SessionStatus, TrackingSession};

#[tokio::test]
async fn full_day_with_a_break() {
    let app = setup().await;
    let me = employee("emp-1");
    let date = day(2025, 3, 10);

    let session = app.tracker.clock_in(&me).await.unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.business_date, date);

    app.set_time(date, 13, 0);
    let paused = app.tracker.pause(&me).await.unwrap();
    assert_eq!(paused.status, SessionStatus::Paused);

    app.set_time(date, 13, 30);
    app.tracker.resume(&me).await.unwrap();

    app.set_time(date, 18, 0);
    let done = app.tracker.clock_out(&me).await.unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(done.clock_out, Some(at(date, 18, 0)));
    assert_eq!(done.total_work_seconds, 8 * 3600 + 30 * 60);
    assert_eq!(done.total_pause_seconds, 30 * 60);

    // persisted totals match
    let mut conn = app.pool.acquire().await.unwrap();
    let stored = db::get_session(&mut conn, &done.id, common::ist())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_work_seconds, 8 * 3600 + 30 * 60);
    assert_eq!(stored.version, 3);
}

#[tokio::test]
async fn second_clock_in_is_rejected() {
    let app = setup().await;
    let me = employee("emp-1");

    app.tracker.clock_in(&me).await.unwrap();
    let err = app.tracker.clock_in(&me).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyClockedIn));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_clock_ins_yield_exactly_one_session() {
    let (app, path) = setup_on_disk(4).await;

    // 여러 연결에서 동시에 출근하면 사전 검사를 함께 통과할 수 있고,
    // 그때는 UNIQUE 인덱스가 하나만 남깁니다.
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let tracker = app.tracker.clone();
            tokio::spawn(async move { tracker.clock_in(&employee("emp-1")).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::AlreadyClockedIn) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(successes, 1);

    let (open,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM tracking_sessions WHERE subject_id = 'emp-1' AND status IN ('active', 'paused')",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(open, 1);

    remove_db_files(app, path).await;
}

#[tokio::test]
async fn store_rejects_a_second_open_session_without_any_precheck() {
    let app = setup().await;
    let date = day(2025, 3, 10);
    let mut conn = app.pool.acquire().await.unwrap();

    let first = TrackingSession::start(db::new_id(), "emp-1", date, at(date, 9, 0));
    db::create_session(&mut conn, &first).await.unwrap();

    let second = TrackingSession::start(db::new_id(), "emp-1", date, at(date, 9, 1));
    let err = db::create_session(&mut conn, &second).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyClockedIn));
}

#[tokio::test]
async fn transitions_check_their_preconditions() {
    let app = setup().await;
    let me = employee("emp-1");

    assert!(matches!(app.tracker.pause(&me).await, Err(AppError::NotClockedIn)));
    assert!(matches!(app.tracker.resume(&me).await, Err(AppError::NotClockedIn)));
    assert!(matches!(app.tracker.clock_out(&me).await, Err(AppError::NotClockedIn)));

    app.tracker.clock_in(&me).await.unwrap();
    assert!(matches!(app.tracker.resume(&me).await, Err(AppError::NotPaused)));

    app.tracker.pause(&me).await.unwrap();
    assert!(matches!(app.tracker.pause(&me).await, Err(AppError::AlreadyPaused)));
}

#[tokio::test]
async fn current_session_reports_live_totals() {
    let app = setup().await;
    let me = employee("emp-1");
    let date = day(2025, 3, 10);

    let idle = app.tracker.current_session(&me).await.unwrap();
    assert!(!idle.has_active_session);
    assert!(idle.session.is_none());

    app.tracker.clock_in(&me).await.unwrap();
    app.set_time(date, 12, 0);
    app.tracker.pause(&me).await.unwrap();
    app.set_time(date, 13, 0);

    let current = app.tracker.current_session(&me).await.unwrap();
    assert!(current.has_active_session);
    assert_eq!(current.current_work_seconds, Some(3 * 3600));
    assert_eq!(current.current_pause_seconds, Some(3600));
}

#[tokio::test]
async fn session_started_late_can_be_closed_after_midnight() {
    let app = setup().await;
    let me = employee("night-shift");

    app.set_time(day(2025, 3, 10), 21, 0);
    app.tracker.clock_in(&me).await.unwrap();

    app.set_time(day(2025, 3, 11), 1, 0);
    let done = app.tracker.clock_out(&me).await.unwrap();
    assert_eq!(done.business_date, day(2025, 3, 10));
    assert_eq!(done.total_work_seconds, 4 * 3600);
}

#[tokio::test]
async fn several_sessions_per_day_are_listed_by_clock_in() {
    let app = setup().await;
    let me = employee("emp-1");
    let date = day(2025, 3, 10);

    app.tracker.clock_in(&me).await.unwrap();
    app.set_time(date, 12, 0);
    app.tracker.clock_out(&me).await.unwrap();

    app.set_time(date, 14, 0);
    app.tracker.clock_in(&me).await.unwrap();

    let sessions = app.tracker.sessions_for_date(&me, date, None).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].clock_in, at(date, 9, 0));
    assert_eq!(sessions[1].clock_in, at(date, 14, 0));
    assert_eq!(sessions[1].status, SessionStatus::Active);
}

#[tokio::test]
async fn only_admins_may_look_at_other_subjects() {
    let app = setup().await;
    let date = day(2025, 3, 10);
    app.tracker.clock_in(&employee("emp-1")).await.unwrap();

    let nosy = employee("emp-2");
    let own = app
        .tracker
        .sessions_for_date(&nosy, date, Some("emp-1"))
        .await
        .unwrap();
    assert!(own.is_empty());

    let boss = common::admin("boss");
    let theirs = app
        .tracker
        .sessions_for_date(&boss, date, Some("emp-1"))
        .await
        .unwrap();
    assert_eq!(theirs.len(), 1);

    let err = app
        .tracker
        .list_sessions(&nosy, &Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn history_is_newest_first_and_filterable() {
    let app = setup().await;
    let me = employee("emp-1");

    for d in [10, 11, 12] {
        app.set_time(day(2025, 3, d), 9, 0);
        app.tracker.clock_in(&me).await.unwrap();
        if d != 12 {
            app.set_time(day(2025, 3, d), 17, 0);
            app.tracker.clock_out(&me).await.unwrap();
        }
    }

    let all = app
        .tracker
        .history(&me, &HistoryQuery::default())
        .await
        .unwrap();
    let dates: Vec<_> = all.iter().map(|s| s.business_date).collect();
    assert_eq!(dates, vec![day(2025, 3, 12), day(2025, 3, 11), day(2025, 3, 10)]);

    let completed = app
        .tracker
        .history(
            &me,
            &HistoryQuery {
                status: Some(SessionStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.len(), 2);
    assert!(completed.iter().all(|s| s.total_work_seconds == 8 * 3600));
}
