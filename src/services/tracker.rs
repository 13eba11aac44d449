//! # 근태 상태 머신 (TrackerEngine)
//!
//! ```text
//! (없음) → ACTIVE → PAUSED ⇄ ACTIVE → COMPLETED
//! ```
//!
//! - 출근(`clock_in`): 오늘 진행 중인 세션이 없어야 함. 최종 판정은 DB의 UNIQUE 인덱스.
//! - 휴식(`pause`): ACTIVE 세션에 열린 휴식 구간을 추가.
//! - 복귀(`resume`): PAUSED 세션의 열린 휴식 구간을 닫음.
//! - 퇴근(`clock_out`): 열린 휴식을 닫고 합계를 확정.
//!
//! 상태 전이 규칙은 `apply_*` 순수 함수에 있고, 엔진은 이를 `db::update_atomic`에
//! 넘겨서 최신 버전의 행에 대해서만 적용되게 합니다.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;

use super::clock::Clock;
use super::retry_on_conflict;
use crate::db::{self, SessionFilter};
use crate::error::AppError;
use crate::models::{
    Actor, AdminSessionQuery, CurrentSession, HistoryQuery, PauseInterval, SessionStatus,
    TrackingSession,
};

type Transition = fn(&mut TrackingSession, DateTime<Utc>) -> Result<(), AppError>;

#[derive(Clone)]
pub struct TrackerEngine {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl TrackerEngine {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    fn tz(&self) -> FixedOffset {
        self.clock.business_tz()
    }

    /// 출근합니다.
    ///
    /// 사전 검사로 흔한 경우(이미 출근함)를 빠르게 걸러내지만, 동시에 들어온 두 요청은
    /// 둘 다 사전 검사를 통과할 수 있습니다. 그 경우 INSERT 하나가 UNIQUE 인덱스에
    /// 걸려 `AlreadyClockedIn`이 됩니다.
    pub async fn clock_in(&self, actor: &Actor) -> Result<TrackingSession, AppError> {
        let now = self.clock.now();
        let today = self.clock.today();
        let mut conn = self.pool.acquire().await?;

        if db::find_open_session(&mut conn, &actor.subject_id, today, self.tz())
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyClockedIn);
        }

        let session = TrackingSession::start(db::new_id(), &actor.subject_id, today, now);
        db::create_session(&mut conn, &session).await?;

        tracing::info!(
            subject_id = %actor.subject_id,
            session_id = %session.id,
            business_date = %today,
            "clocked in"
        );
        Ok(session)
    }

    pub async fn pause(&self, actor: &Actor) -> Result<TrackingSession, AppError> {
        self.transition("pause", actor, apply_pause).await
    }

    pub async fn resume(&self, actor: &Actor) -> Result<TrackingSession, AppError> {
        self.transition("resume", actor, apply_resume).await
    }

    pub async fn clock_out(&self, actor: &Actor) -> Result<TrackingSession, AppError> {
        self.transition("clock_out", actor, apply_clock_out).await
    }

    async fn transition(
        &self,
        operation: &'static str,
        actor: &Actor,
        apply: Transition,
    ) -> Result<TrackingSession, AppError> {
        let session = retry_on_conflict(operation, || self.transition_once(actor, apply)).await?;

        tracing::info!(
            subject_id = %actor.subject_id,
            session_id = %session.id,
            status = %session.status,
            operation,
            "session updated"
        );
        Ok(session)
    }

    async fn transition_once(
        &self,
        actor: &Actor,
        apply: Transition,
    ) -> Result<TrackingSession, AppError> {
        let mut conn = self.pool.acquire().await?;
        let open = self
            .locate_open(&mut conn, &actor.subject_id)
            .await?
            .ok_or(AppError::NotClockedIn)?;

        let now = self.clock.now();
        db::update_atomic(&mut conn, &open.id, self.tz(), |session| apply(session, now)).await
    }

    /// 진행 중인 세션을 찾습니다. 자정을 넘긴 세션도 닫을 수 있도록
    /// 오늘 다음에 어제 업무일도 확인합니다.
    async fn locate_open(
        &self,
        conn: &mut SqliteConnection,
        subject_id: &str,
    ) -> Result<Option<TrackingSession>, AppError> {
        let today = self.clock.today();
        for date in [Some(today), today.pred_opt()].into_iter().flatten() {
            if let Some(session) = db::find_open_session(conn, subject_id, date, self.tz()).await? {
                return Ok(Some(session));
            }
        }
        Ok(None)
    }

    /// 진행 중인 세션과, 지금 시각 기준으로 다시 계산한 근무/휴식 시간
    pub async fn current_session(&self, actor: &Actor) -> Result<CurrentSession, AppError> {
        let mut conn = self.pool.acquire().await?;
        let open = self.locate_open(&mut conn, &actor.subject_id).await?;
        let now = self.clock.now();

        Ok(match open {
            Some(session) => {
                let session = session.with_live_totals(now);
                CurrentSession {
                    has_active_session: true,
                    current_work_seconds: Some(session.total_work_seconds),
                    current_pause_seconds: Some(session.total_pause_seconds),
                    session: Some(session),
                }
            }
            None => CurrentSession {
                has_active_session: false,
                session: None,
                current_work_seconds: None,
                current_pause_seconds: None,
            },
        })
    }

    /// 본인의 세션 이력 (최신순)
    pub async fn history(
        &self,
        actor: &Actor,
        query: &HistoryQuery,
    ) -> Result<Vec<TrackingSession>, AppError> {
        let filter = SessionFilter {
            subject_id: Some(actor.subject_id.clone()),
            start: query.start_date,
            end: query.end_date,
            statuses: query.status.into_iter().collect(),
        };
        let mut sessions = self.load(&filter).await?;
        sessions.reverse();
        Ok(sessions)
    }

    /// 특정 날짜의 세션 목록 (출근 시각 순)
    ///
    /// 관리자는 `user_id`로 다른 사람을 조회할 수 있고, 일반 사용자는 항상 본인 것만 봅니다.
    pub async fn sessions_for_date(
        &self,
        actor: &Actor,
        date: NaiveDate,
        user_id: Option<&str>,
    ) -> Result<Vec<TrackingSession>, AppError> {
        let subject_id = match user_id {
            Some(other) if actor.is_admin => other,
            _ => actor.subject_id.as_str(),
        };
        let filter = SessionFilter {
            subject_id: Some(subject_id.to_string()),
            start: Some(date),
            end: Some(date),
            statuses: Vec::new(),
        };
        self.load(&filter).await
    }

    /// 관리자용 전체 세션 조회
    pub async fn list_sessions(
        &self,
        actor: &Actor,
        query: &AdminSessionQuery,
    ) -> Result<Vec<TrackingSession>, AppError> {
        if !actor.is_admin {
            return Err(AppError::Forbidden("admin role required".to_string()));
        }
        let filter = SessionFilter {
            subject_id: query.user_id.clone(),
            start: query.start_date,
            end: query.end_date,
            statuses: query.status.into_iter().collect(),
        };
        self.load(&filter).await
    }

    /// 조회 후 진행 중인 세션은 합계를 현재 시각 기준으로 갱신합니다.
    async fn load(&self, filter: &SessionFilter) -> Result<Vec<TrackingSession>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let sessions = db::find_by_date_range(&mut conn, filter, self.tz()).await?;
        let now = self.clock.now();
        Ok(sessions
            .into_iter()
            .map(|s| s.with_live_totals(now))
            .collect())
    }
}

/// ACTIVE → PAUSED
pub fn apply_pause(session: &mut TrackingSession, now: DateTime<Utc>) -> Result<(), AppError> {
    match session.status {
        SessionStatus::Completed => return Err(AppError::NotClockedIn),
        SessionStatus::Paused => return Err(AppError::AlreadyPaused),
        SessionStatus::Active if session.open_pause().is_some() => {
            return Err(AppError::AlreadyPaused)
        }
        SessionStatus::Active => {}
    }

    session.pause_intervals.push(PauseInterval::open(now.max(session.clock_in)));
    session.status = SessionStatus::Paused;
    session.refresh_totals(now);
    session.updated_at = now;
    Ok(())
}

/// PAUSED → ACTIVE
pub fn apply_resume(session: &mut TrackingSession, now: DateTime<Utc>) -> Result<(), AppError> {
    match session.status {
        SessionStatus::Completed => return Err(AppError::NotClockedIn),
        SessionStatus::Active => return Err(AppError::NotPaused),
        SessionStatus::Paused => {}
    }

    session.close_open_pause(now);
    session.status = SessionStatus::Active;
    session.refresh_totals(now);
    session.updated_at = now;
    Ok(())
}

/// ACTIVE | PAUSED → COMPLETED
pub fn apply_clock_out(session: &mut TrackingSession, now: DateTime<Utc>) -> Result<(), AppError> {
    if !session.status.is_open() {
        return Err(AppError::NotClockedIn);
    }

    let clock_out = now.max(session.clock_in);
    session.close_open_pause(clock_out);
    session.clock_out = Some(clock_out);
    session.status = SessionStatus::Completed;
    session.refresh_totals(clock_out);
    session.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
    }

    fn active_session() -> TrackingSession {
        TrackingSession::start(
            "s1".into(),
            "emp-1",
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            t(3, 30),
        )
    }

    #[test]
    fn pause_then_resume_records_one_closed_interval() {
        let mut s = active_session();
        apply_pause(&mut s, t(6, 30)).unwrap();
        assert_eq!(s.status, SessionStatus::Paused);
        assert!(s.open_pause().is_some());

        apply_resume(&mut s, t(7, 0)).unwrap();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.pause_intervals, vec![PauseInterval::closed(t(6, 30), t(7, 0))]);
        assert_eq!(s.total_pause_seconds, 30 * 60);
    }

    #[test]
    fn preconditions_are_enforced() {
        let mut s = active_session();
        assert!(matches!(apply_resume(&mut s, t(4, 0)), Err(AppError::NotPaused)));

        apply_pause(&mut s, t(4, 0)).unwrap();
        assert!(matches!(apply_pause(&mut s, t(4, 5)), Err(AppError::AlreadyPaused)));

        apply_clock_out(&mut s, t(5, 0)).unwrap();
        assert!(matches!(apply_pause(&mut s, t(5, 5)), Err(AppError::NotClockedIn)));
        assert!(matches!(apply_resume(&mut s, t(5, 5)), Err(AppError::NotClockedIn)));
        assert!(matches!(apply_clock_out(&mut s, t(5, 5)), Err(AppError::NotClockedIn)));
    }

    #[test]
    fn clock_out_while_paused_closes_the_pause() {
        let mut s = active_session();
        apply_pause(&mut s, t(8, 30)).unwrap();
        apply_clock_out(&mut s, t(9, 30)).unwrap();

        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.clock_out, Some(t(9, 30)));
        assert!(s.open_pause().is_none());
        assert_eq!(s.total_work_seconds, 5 * 3600);
        assert_eq!(s.total_pause_seconds, 3600);
    }

    #[test]
    fn clock_out_never_precedes_clock_in() {
        let mut s = active_session();
        apply_clock_out(&mut s, t(3, 30) - Duration::minutes(5)).unwrap();
        assert_eq!(s.clock_out, Some(t(3, 30)));
        assert_eq!(s.total_work_seconds, 0);
    }
}
