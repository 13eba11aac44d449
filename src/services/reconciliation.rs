//! # 자동 퇴근 처리 (Daily reconciliation)
//!
//! 퇴근을 잊은 세션을 매일 정해진 시각(업무 시간대 기준, 기본 23:00)에 닫습니다.
//!
//! ## 처리 방식
//! 1. 업무일이 오늘/어제인 ACTIVE·PAUSED 세션을 모두 찾습니다.
//! 2. 세션마다 트랜잭션을 따로 열어 닫고 `auto_closed` 감사 로그를 남깁니다.
//!    한 세션이 실패해도 로그만 남기고 나머지는 계속 처리합니다.
//! 3. 닫는 시각은 실행 시각이 아니라 **그 세션 업무일의 마감 시각**입니다.
//!    단, 아직 오지 않은 미래 시각이나 출근 시각 이전으로는 닫지 않습니다.
//!
//! 다시 실행해도 닫을 세션이 남아 있지 않으므로 여러 번 실행해도 안전합니다.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::clock::Clock;
use super::retry_on_conflict;
use super::time_math::{business_date, local_instant};
use crate::db::{self, OpenSessionKey};
use crate::error::AppError;
use crate::models::{AuditAction, NewAuditEntry, SessionStatus, TrackingSession, SYSTEM_ACTOR};

/// 한 번 실행한 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub cutoff_date: NaiveDate,
    pub scanned: usize,
    pub closed: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct ReconciliationJob {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    cutoff: NaiveTime,
}

impl ReconciliationJob {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, cutoff: NaiveTime) -> Self {
        Self {
            pool,
            clock,
            cutoff,
        }
    }

    fn tz(&self) -> FixedOffset {
        self.clock.business_tz()
    }

    /// 업무일 `date`의 마감 시각 (UTC)
    pub fn cutoff_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        local_instant(self.tz(), date, self.cutoff)
    }

    /// 가장 최근에 지난 마감의 업무일.
    /// 오늘 마감 전이면 어제, 지났으면 오늘입니다.
    pub fn latest_cutoff_date(&self) -> NaiveDate {
        let today = self.clock.today();
        if self.clock.now() >= self.cutoff_instant(today) {
            today
        } else {
            today.pred_opt().unwrap_or(today)
        }
    }

    /// `cutoff_date`와 그 전날의 진행 중인 세션을 모두 닫습니다.
    pub async fn run_daily_reconciliation(
        &self,
        cutoff_date: NaiveDate,
    ) -> Result<ReconciliationSummary, AppError> {
        let dates: Vec<NaiveDate> = [Some(cutoff_date), cutoff_date.pred_opt()]
            .into_iter()
            .flatten()
            .collect();

        // 목록 조회용 연결은 세션별 트랜잭션을 열기 전에 반납합니다.
        let sessions = {
            let mut conn = self.pool.acquire().await?;
            db::list_open_sessions_for_dates(&mut conn, &dates).await?
        };

        let mut summary = ReconciliationSummary {
            cutoff_date,
            scanned: sessions.len(),
            closed: 0,
            skipped: 0,
        };

        for key in sessions {
            match self.close_session(&key).await {
                Ok(closed) => {
                    summary.closed += 1;
                    tracing::info!(
                        session_id = %closed.id,
                        subject_id = %closed.subject_id,
                        clock_out = ?closed.clock_out,
                        "session auto-closed"
                    );
                }
                Err(AppError::NotClockedIn) => {
                    // 조회 이후 사용자가 직접 퇴근한 경우
                    summary.skipped += 1;
                    tracing::debug!(session_id = %key.id, "session already closed");
                }
                Err(e) => {
                    summary.skipped += 1;
                    tracing::error!(
                        session_id = %key.id,
                        subject_id = %key.subject_id,
                        error = %e,
                        "failed to auto-close session"
                    );
                }
            }
        }

        tracing::info!(
            cutoff_date = %summary.cutoff_date,
            scanned = summary.scanned,
            closed = summary.closed,
            skipped = summary.skipped,
            "reconciliation finished"
        );
        Ok(summary)
    }

    async fn close_session(&self, key: &OpenSessionKey) -> Result<TrackingSession, AppError> {
        let cutoff = self.cutoff_instant(key.business_date);
        retry_on_conflict("auto_close", || self.close_once(&key.id, cutoff)).await
    }

    /// 세션 하나를 닫고 감사 로그를 남깁니다. 둘은 한 트랜잭션입니다.
    async fn close_once(
        &self,
        session_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<TrackingSession, AppError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let mut before = None;
        let closed = db::update_atomic(&mut tx, session_id, self.tz(), |session| {
            before = Some(db::snapshot_json(session)?);
            apply_auto_close(session, cutoff, now)
        })
        .await?;

        db::append_audit(
            &mut tx,
            NewAuditEntry {
                request_id: None,
                session_id: Some(closed.id.clone()),
                action: AuditAction::AutoClosed,
                performed_by: SYSTEM_ACTOR.to_string(),
                old_values: before,
                new_values: Some(db::snapshot_json(&closed)?),
                notes: Some(format!("closed at daily cutoff {}", closed.business_date)),
            },
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(closed)
    }
}

/// 진행 중인 세션을 마감 시각에 닫습니다.
///
/// 닫는 시각 = `max(clock_in, min(cutoff, now))`
pub fn apply_auto_close(
    session: &mut TrackingSession,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if !session.status.is_open() {
        return Err(AppError::NotClockedIn);
    }

    let close_at = cutoff.min(now).max(session.clock_in);
    session.close_open_pause(close_at);
    session.clock_out = Some(close_at);
    session.status = SessionStatus::Completed;
    session.refresh_totals(close_at);
    session.updated_at = now;
    Ok(())
}

/// `now` 다음에 오는 마감 시각
pub fn next_cutoff_after(now: DateTime<Utc>, tz: FixedOffset, cutoff: NaiveTime) -> DateTime<Utc> {
    let today = business_date(now, tz);
    let candidate = local_instant(tz, today, cutoff);
    if candidate > now {
        return candidate;
    }
    match today.succ_opt() {
        Some(tomorrow) => local_instant(tz, tomorrow, cutoff),
        None => candidate,
    }
}

enum SchedulerCommand {
    Stop,
}

/// 마감 시각마다 `ReconciliationJob`을 실행하는 백그라운드 태스크
pub struct ReconciliationScheduler;

impl ReconciliationScheduler {
    pub fn spawn(job: ReconciliationJob) -> SchedulerHandle {
        let (tx, mut rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            let tz = job.tz();
            let mut last_run: Option<DateTime<Utc>> = None;

            loop {
                let now = job.clock.now();
                let from = last_run.map_or(now, |last| now.max(last));
                let next = next_cutoff_after(from, tz, job.cutoff);
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::info!(next_run = %next, "reconciliation scheduled");

                tokio::select! {
                    cmd = rx.recv() => {
                        match cmd {
                            Some(SchedulerCommand::Stop) | None => {
                                tracing::info!("reconciliation scheduler stopping");
                                break;
                            }
                        }
                    }
                    _ = tokio::time::sleep(wait) => {
                        last_run = Some(next);
                        let cutoff_date = business_date(next, tz);
                        if let Err(e) = job.run_daily_reconciliation(cutoff_date).await {
                            tracing::error!(%cutoff_date, error = %e, "reconciliation run failed");
                        }
                    }
                }
            }
        });

        SchedulerHandle { commands: tx, task }
    }
}

pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// 스케줄러를 멈추고 태스크가 끝날 때까지 기다립니다.
    pub async fn shutdown(self) {
        let _ = self.commands.send(SchedulerCommand::Stop).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "reconciliation scheduler task ended abnormally");
        }
    }
}
