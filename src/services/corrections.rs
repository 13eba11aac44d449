//! # 근태 정정 워크플로우
//!
//! ```text
//! 직원: submit ──> PENDING ──(관리자 approve)──> APPROVED  (세션 수정/생성)
//!                        └──(관리자 reject)───> REJECTED  (메모 필수)
//! ```
//!
//! - 제출 시 검증: 이슈 유형별 필수 필드, 퇴근 > 출근, 휴식 구간 범위,
//!   같은 날짜의 다른 세션과의 겹침.
//! - 승인은 세션 수정, 요청 상태 변경, 감사 로그 추가를 한 트랜잭션으로 묶습니다.
//!   세션 수정이 실패하면 요청도 승인되지 않습니다.
//! - 모든 제출/승인/반려는 감사 로그에 남습니다.

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;

use super::clock::Clock;
use super::notify::Notifier;
use super::retry_on_conflict;
use super::time_math::normalize_timestamp;
use crate::db::{self, RequestFilter};
use crate::error::AppError;
use crate::models::{
    Actor, AuditAction, AuditEntry, CorrectionListQuery, CorrectionRequest, CorrectionStatus,
    IssueType, NewAuditEntry, PauseInterval, RequestedPause, SessionStatus,
    SubmitCorrectionRequest, TrackingSession,
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// 정규화된 제안 값. None인 필드는 "바꾸지 않음"입니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Proposal {
    pub clock_in: Option<DateTime<Utc>>,
    pub clock_out: Option<DateTime<Utc>>,
    pub pauses: Option<Vec<PauseInterval>>,
}

impl Proposal {
    /// 요청 본문의 시각 문자열을 UTC로 정규화합니다.
    pub fn from_submission(
        body: &SubmitCorrectionRequest,
        tz: FixedOffset,
    ) -> Result<Self, AppError> {
        let pauses = match body.requested_pause_intervals.as_deref() {
            None | Some([]) => None,
            Some(list) => Some(
                list.iter()
                    .map(|p| parse_requested_pause(p, tz))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        Ok(Self {
            clock_in: parse_requested(body.requested_clock_in.as_deref(), "requested_clock_in", tz)?,
            clock_out: parse_requested(
                body.requested_clock_out.as_deref(),
                "requested_clock_out",
                tz,
            )?,
            pauses,
        })
    }

    fn of_request(request: &CorrectionRequest) -> Self {
        Self {
            clock_in: request.requested_clock_in,
            clock_out: request.requested_clock_out,
            pauses: request.requested_pause_intervals.clone(),
        }
    }
}

fn parse_requested(
    raw: Option<&str>,
    field: &str,
    tz: FixedOffset,
) -> Result<Option<DateTime<Utc>>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => normalize_timestamp(value, tz)
            .map(Some)
            .ok_or_else(|| AppError::validation(field, format!("unrecognized timestamp {value:?}"))),
    }
}

fn parse_requested_pause(pause: &RequestedPause, tz: FixedOffset) -> Result<PauseInterval, AppError> {
    const FIELD: &str = "requested_pause_intervals";
    let start = parse_requested(pause.start.as_deref(), FIELD, tz)?;
    let end = parse_requested(pause.end.as_deref(), FIELD, tz)?;
    match (start, end) {
        (Some(start), Some(end)) => Ok(PauseInterval::closed(start, end)),
        _ => Err(AppError::validation(
            FIELD,
            "each pause interval needs both a start and an end",
        )),
    }
}

/// 이슈 유형별 필수 필드 검사
pub fn require_fields(
    issue_type: IssueType,
    proposal: &Proposal,
    has_target: bool,
) -> Result<(), AppError> {
    match issue_type {
        IssueType::MissedClockIn if proposal.clock_in.is_none() => {
            return Err(AppError::validation(
                "requested_clock_in",
                "a clock-in time is required for missed_clock_in",
            ));
        }
        IssueType::MissedClockOut if proposal.clock_out.is_none() => {
            return Err(AppError::validation(
                "requested_clock_out",
                "a clock-out time is required for missed_clock_out",
            ));
        }
        IssueType::WrongTime | IssueType::MissedPunch
            if proposal.clock_in.is_none() && proposal.clock_out.is_none() =>
        {
            return Err(AppError::validation(
                "requested_clock_in",
                "provide a clock-in or a clock-out time",
            ));
        }
        IssueType::ForgotResume if proposal.pauses.is_none() && proposal.clock_out.is_none() => {
            return Err(AppError::validation(
                "requested_pause_intervals",
                "provide the corrected pause intervals or a clock-out time",
            ));
        }
        _ => {}
    }

    if !has_target && proposal.clock_in.is_none() {
        return Err(AppError::validation(
            "requested_clock_in",
            "a clock-in time is required when there is no session to correct",
        ));
    }
    Ok(())
}

/// 제안된 값이 세션 규칙에 맞는지 검사합니다.
///
/// 실효 구간은 제안 값이 있으면 제안 값, 없으면 대상 세션의 현재 값입니다.
/// `day_sessions`는 같은 사용자·같은 날짜의 모든 세션입니다 (대상 세션 포함 가능).
pub fn validate_proposal(
    issue_type: IssueType,
    proposal: &Proposal,
    target: Option<&TrackingSession>,
    day_sessions: &[TrackingSession],
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let effective_in = proposal.clock_in.or(target.map(|t| t.clock_in));
    let effective_out = proposal.clock_out.or(target.and_then(|t| t.clock_out));

    if let (Some(clock_in), Some(clock_out)) = (effective_in, effective_out) {
        if clock_out <= clock_in {
            let field = if proposal.clock_out.is_some() {
                "requested_clock_out"
            } else {
                "requested_clock_in"
            };
            return Err(AppError::validation(field, "clock-out must be after clock-in"));
        }
    }

    if let Some(pauses) = &proposal.pauses {
        validate_pauses(issue_type, pauses, effective_in, effective_out)?;
    }

    check_overlap(effective_in, effective_out, target, day_sessions, now)
}

fn validate_pauses(
    issue_type: IssueType,
    pauses: &[PauseInterval],
    effective_in: Option<DateTime<Utc>>,
    effective_out: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    const FIELD: &str = "requested_pause_intervals";

    // forgot_resume은 새 타임라인을 정의하는 것이라 순서만 봅니다.
    if issue_type == IssueType::ForgotResume {
        for pause in pauses {
            if pause.end.map_or(true, |end| end <= pause.start) {
                return Err(AppError::validation(FIELD, "pause end must be after its start"));
            }
        }
        return Ok(());
    }

    let (Some(window_start), Some(window_end)) = (effective_in, effective_out) else {
        return Err(AppError::validation(
            FIELD,
            "both clock-in and clock-out are needed to validate pause intervals",
        ));
    };

    for pause in pauses {
        let Some(end) = pause.end else {
            return Err(AppError::validation(FIELD, "pause intervals must be closed"));
        };
        if end < pause.start {
            return Err(AppError::validation(FIELD, "pause end cannot be before its start"));
        }
        if pause.start < window_start || end > window_end {
            return Err(AppError::validation(
                FIELD,
                "pause intervals must lie within the clock-in/clock-out window",
            ));
        }
    }
    Ok(())
}

/// 같은 날의 다른 세션과 겹치는지 검사합니다. 대상 세션 자신은 제외합니다.
/// 진행 중인 다른 세션은 `now`까지로 봅니다.
fn check_overlap(
    effective_in: Option<DateTime<Utc>>,
    effective_out: Option<DateTime<Utc>>,
    target: Option<&TrackingSession>,
    day_sessions: &[TrackingSession],
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let (Some(start), Some(end)) = (effective_in, effective_out) else {
        return Ok(());
    };
    let target_id = target.map(|t| t.id.as_str());

    for other in day_sessions {
        if Some(other.id.as_str()) == target_id {
            continue;
        }
        let other_end = other.clock_out.unwrap_or(now).max(other.clock_in);
        if start < other_end && end > other.clock_in {
            return Err(AppError::Overlap {
                session_id: other.id.clone(),
                start: other.clock_in,
                end: other_end,
            });
        }
    }
    Ok(())
}

/// 승인된 제안을 세션에 적용합니다. 제안된 필드만 바뀝니다.
pub fn apply_correction(
    session: &mut TrackingSession,
    proposal: &Proposal,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if let Some(clock_in) = proposal.clock_in {
        session.clock_in = clock_in;
    }
    if let Some(pauses) = &proposal.pauses {
        session.pause_intervals = pauses.clone();
        if session.status == SessionStatus::Paused && session.open_pause().is_none() {
            session.status = SessionStatus::Active;
        }
    }
    if let Some(clock_out) = proposal.clock_out {
        session.close_open_pause(clock_out);
        session.clock_out = Some(clock_out);
        session.status = SessionStatus::Completed;
    }

    if let Some(clock_out) = session.clock_out {
        if clock_out <= session.clock_in {
            return Err(AppError::validation(
                "requested_clock_out",
                "clock-out must be after clock-in",
            ));
        }
    }

    session.refresh_totals(now);
    session.updated_at = now;
    Ok(())
}

/// 대상 세션 없이 승인된 요청으로 새 세션을 만듭니다.
fn session_from_request(
    request: &CorrectionRequest,
    proposal: &Proposal,
    now: DateTime<Utc>,
) -> Result<TrackingSession, AppError> {
    let clock_in = proposal.clock_in.ok_or_else(|| {
        AppError::validation(
            "requested_clock_in",
            "a clock-in time is required to create a session",
        )
    })?;

    let mut session =
        TrackingSession::start(db::new_id(), &request.subject_id, request.request_date, clock_in);
    session.created_at = now;
    session.updated_at = now;
    session.pause_intervals = proposal.pauses.clone().unwrap_or_default();
    if let Some(clock_out) = proposal.clock_out {
        if clock_out <= clock_in {
            return Err(AppError::validation(
                "requested_clock_out",
                "clock-out must be after clock-in",
            ));
        }
        session.clock_out = Some(clock_out);
        session.status = SessionStatus::Completed;
    }
    session.refresh_totals(now);
    Ok(session)
}

fn require_admin(actor: &Actor) -> Result<(), AppError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin role required".to_string()))
    }
}

fn page(limit: Option<i64>, skip: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        skip.unwrap_or(0).max(0),
    )
}

#[derive(Clone)]
pub struct CorrectionWorkflow {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl CorrectionWorkflow {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            clock,
            notifier,
        }
    }

    fn tz(&self) -> FixedOffset {
        self.clock.business_tz()
    }

    /// 정정 요청을 제출합니다.
    pub async fn submit(
        &self,
        actor: &Actor,
        body: SubmitCorrectionRequest,
    ) -> Result<CorrectionRequest, AppError> {
        let tz = self.tz();
        let reason = body.reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::validation("reason", "a reason is required"));
        }
        let proposal = Proposal::from_submission(&body, tz)?;
        let now = self.clock.now();

        let mut tx = self.pool.begin().await?;

        if db::find_pending_request(&mut tx, &actor.subject_id, body.request_date, tz)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicatePendingRequest);
        }

        let day_sessions =
            db::list_sessions_for_date(&mut tx, &actor.subject_id, body.request_date, tz).await?;

        let target = match body.target_session_id.as_deref() {
            Some(id) => Some(resolve_target(&mut tx, actor, &body, id, &day_sessions, tz).await?),
            // 지정하지 않으면 진행 중인 세션, 없으면 그날 첫 세션
            None => day_sessions
                .iter()
                .find(|s| s.status.is_open())
                .or_else(|| day_sessions.first())
                .cloned(),
        };

        require_fields(body.issue_type, &proposal, target.is_some())?;
        validate_proposal(body.issue_type, &proposal, target.as_ref(), &day_sessions, now)?;

        let request = CorrectionRequest {
            id: db::new_id(),
            subject_id: actor.subject_id.clone(),
            target_session_id: target.as_ref().map(|t| t.id.clone()),
            request_date: body.request_date,
            issue_type: body.issue_type,
            current_clock_in: target.as_ref().map(|t| t.clock_in),
            current_clock_out: target.as_ref().and_then(|t| t.clock_out),
            current_pause_intervals: target.as_ref().map(|t| t.pause_intervals.clone()),
            requested_clock_in: proposal.clock_in,
            requested_clock_out: proposal.clock_out,
            requested_pause_intervals: proposal.pauses.clone(),
            reason,
            status: CorrectionStatus::Pending,
            reviewer_id: None,
            reviewed_at: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        };

        db::insert_request(&mut tx, &request).await?;
        db::append_audit(
            &mut tx,
            NewAuditEntry {
                request_id: Some(request.id.clone()),
                session_id: request.target_session_id.clone(),
                action: AuditAction::Created,
                performed_by: actor.subject_id.clone(),
                old_values: None,
                new_values: Some(json!({
                    "issue_type": request.issue_type,
                    "requested_clock_in": request.requested_clock_in,
                    "requested_clock_out": request.requested_clock_out,
                    "requested_pause_intervals": request.requested_pause_intervals,
                })),
                notes: Some(request.reason.clone()),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            subject_id = %request.subject_id,
            issue_type = %request.issue_type,
            request_date = %request.request_date,
            "correction request submitted"
        );
        Ok(request)
    }

    /// 요청을 승인하고 세션에 반영합니다. (관리자 전용)
    pub async fn approve(
        &self,
        actor: &Actor,
        request_id: &str,
        admin_notes: Option<String>,
    ) -> Result<CorrectionRequest, AppError> {
        require_admin(actor)?;
        let notes = admin_notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let request = retry_on_conflict("approve_correction", || {
            self.approve_once(actor, request_id, notes.as_deref())
        })
        .await?;

        tracing::info!(
            request_id = %request.id,
            reviewer_id = %actor.subject_id,
            session_id = request.target_session_id.as_deref().unwrap_or("-"),
            "correction request approved"
        );
        self.notifier.correction_reviewed(&request);
        Ok(request)
    }

    async fn approve_once(
        &self,
        actor: &Actor,
        request_id: &str,
        notes: Option<&str>,
    ) -> Result<CorrectionRequest, AppError> {
        let tz = self.tz();
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let mut request = db::get_request(&mut tx, request_id, tz)
            .await?
            .ok_or(AppError::NotFound)?;
        if request.status != CorrectionStatus::Pending {
            return Err(AppError::RequestNotPending(request.status));
        }

        let proposal = Proposal::of_request(&request);
        let day_sessions =
            db::list_sessions_for_date(&mut tx, &request.subject_id, request.request_date, tz)
                .await?;
        let target = match request.target_session_id.as_deref() {
            Some(id) => Some(
                db::get_session(&mut tx, id, tz)
                    .await?
                    .ok_or(AppError::NotFound)?,
            ),
            None => None,
        };

        // 제출 이후 세션이 바뀌었을 수 있으므로 겹침을 다시 확인합니다.
        let effective_in = proposal.clock_in.or(target.as_ref().map(|t| t.clock_in));
        let effective_out = proposal
            .clock_out
            .or(target.as_ref().and_then(|t| t.clock_out));
        check_overlap(effective_in, effective_out, target.as_ref(), &day_sessions, now)?;

        let (before, after) = match &target {
            Some(target) => {
                let mut before = None;
                let after = db::update_atomic(&mut tx, &target.id, tz, |session| {
                    before = Some(db::snapshot_json(session)?);
                    apply_correction(session, &proposal, now)
                })
                .await?;
                (before, after)
            }
            None => {
                let session = session_from_request(&request, &proposal, now)?;
                db::create_session(&mut tx, &session).await?;
                (None, session)
            }
        };

        db::mark_reviewed(
            &mut tx,
            &request.id,
            CorrectionStatus::Approved,
            &actor.subject_id,
            now,
            notes,
            Some(&after.id),
        )
        .await?;

        db::append_audit(
            &mut tx,
            NewAuditEntry {
                request_id: Some(request.id.clone()),
                session_id: Some(after.id.clone()),
                action: AuditAction::Approved,
                performed_by: actor.subject_id.clone(),
                old_values: before,
                new_values: Some(db::snapshot_json(&after)?),
                notes: Some(notes.unwrap_or("Request approved").to_string()),
            },
            now,
        )
        .await?;

        tx.commit().await?;

        request.status = CorrectionStatus::Approved;
        request.reviewer_id = Some(actor.subject_id.clone());
        request.reviewed_at = Some(now);
        request.admin_notes = notes.map(str::to_string);
        request.target_session_id = Some(after.id);
        request.updated_at = now;
        Ok(request)
    }

    /// 요청을 반려합니다. (관리자 전용, 메모 필수)
    pub async fn reject(
        &self,
        actor: &Actor,
        request_id: &str,
        admin_notes: Option<String>,
    ) -> Result<CorrectionRequest, AppError> {
        require_admin(actor)?;
        let notes = admin_notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::validation("admin_notes", "a note is required to reject"))?;

        let request = retry_on_conflict("reject_correction", || {
            self.reject_once(actor, request_id, &notes)
        })
        .await?;

        tracing::info!(
            request_id = %request.id,
            reviewer_id = %actor.subject_id,
            "correction request rejected"
        );
        self.notifier.correction_reviewed(&request);
        Ok(request)
    }

    async fn reject_once(
        &self,
        actor: &Actor,
        request_id: &str,
        notes: &str,
    ) -> Result<CorrectionRequest, AppError> {
        let tz = self.tz();
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let mut request = db::get_request(&mut tx, request_id, tz)
            .await?
            .ok_or(AppError::NotFound)?;
        if request.status != CorrectionStatus::Pending {
            return Err(AppError::RequestNotPending(request.status));
        }

        db::mark_reviewed(
            &mut tx,
            &request.id,
            CorrectionStatus::Rejected,
            &actor.subject_id,
            now,
            Some(notes),
            None,
        )
        .await?;
        db::append_audit(
            &mut tx,
            NewAuditEntry {
                request_id: Some(request.id.clone()),
                session_id: request.target_session_id.clone(),
                action: AuditAction::Rejected,
                performed_by: actor.subject_id.clone(),
                old_values: None,
                new_values: None,
                notes: Some(notes.to_string()),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        request.status = CorrectionStatus::Rejected;
        request.reviewer_id = Some(actor.subject_id.clone());
        request.reviewed_at = Some(now);
        request.admin_notes = Some(notes.to_string());
        request.updated_at = now;
        Ok(request)
    }

    /// 본인이 제출한 요청 목록 (최신순)
    pub async fn my_requests(
        &self,
        actor: &Actor,
        query: &CorrectionListQuery,
    ) -> Result<Vec<CorrectionRequest>, AppError> {
        let (limit, skip) = page(query.limit, query.skip);
        let filter = RequestFilter {
            subject_id: Some(actor.subject_id.clone()),
            status: query.status,
            limit,
            skip,
        };
        let mut conn = self.pool.acquire().await?;
        db::list_requests(&mut conn, &filter, self.tz()).await
    }

    /// 전체 요청 목록 (관리자 전용)
    pub async fn all_requests(
        &self,
        actor: &Actor,
        query: &CorrectionListQuery,
    ) -> Result<Vec<CorrectionRequest>, AppError> {
        require_admin(actor)?;
        let (limit, skip) = page(query.limit, query.skip);
        let filter = RequestFilter {
            subject_id: query.user_id.clone(),
            status: query.status,
            limit,
            skip,
        };
        let mut conn = self.pool.acquire().await?;
        db::list_requests(&mut conn, &filter, self.tz()).await
    }

    /// 요청 상세. 본인 또는 관리자만 볼 수 있습니다.
    pub async fn request_detail(
        &self,
        actor: &Actor,
        request_id: &str,
    ) -> Result<CorrectionRequest, AppError> {
        let mut conn = self.pool.acquire().await?;
        let request = db::get_request(&mut conn, request_id, self.tz())
            .await?
            .ok_or(AppError::NotFound)?;
        if !actor.can_access(&request.subject_id) {
            return Err(AppError::Forbidden(
                "not allowed to view this request".to_string(),
            ));
        }
        Ok(request)
    }

    /// 요청의 감사 로그 (오래된 것부터)
    pub async fn request_log(
        &self,
        actor: &Actor,
        request_id: &str,
    ) -> Result<Vec<AuditEntry>, AppError> {
        let request = self.request_detail(actor, request_id).await?;
        let mut conn = self.pool.acquire().await?;
        db::list_audit_for_request(&mut conn, &request.id, self.tz()).await
    }
}

/// 명시된 대상 세션을 찾습니다. 본인 세션이어야 하고 요청 날짜와 같은 날이어야 합니다.
async fn resolve_target(
    conn: &mut sqlx::SqliteConnection,
    actor: &Actor,
    body: &SubmitCorrectionRequest,
    id: &str,
    day_sessions: &[TrackingSession],
    tz: FixedOffset,
) -> Result<TrackingSession, AppError> {
    if let Some(session) = day_sessions.iter().find(|s| s.id == id) {
        return Ok(session.clone());
    }

    match db::get_session(conn, id, tz).await? {
        Some(session) if session.subject_id == actor.subject_id => Err(AppError::validation(
            "target_session_id",
            format!(
                "session belongs to {} but the request is for {}",
                session.business_date, body.request_date
            ),
        )),
        _ => Err(AppError::NotFound),
    }
}
