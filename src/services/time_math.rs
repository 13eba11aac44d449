//! # 근무/휴식 시간 계산
//!
//! 상태도 I/O도 없는 순수 함수들입니다. 세션의 출근/퇴근 시각과 휴식 구간 목록으로
//! 근무 시간과 휴식 시간을 초 단위로 계산합니다.
//!
//! ## 시간대 처리
//! 오프셋 없는 시각 문자열을 업무 시간대로 간주하는 곳은 `normalize_timestamp` 하나뿐입니다.
//! 그 뒤의 모든 계산은 `DateTime<Utc>`끼리만 합니다.
//!
//! ## 계산 규칙
//! ```text
//! effective_end = clock_out ?? now ?? 현재 시각
//! elapsed       = max(0, effective_end - clock_in)
//! pause         = [clock_in, effective_end]로 잘라낸 휴식 구간들의 합집합 길이
//! work          = elapsed - pause
//! ```
//! 휴식 구간이 뒤섞이거나 겹쳐 있어도 에러를 내지 않고, 항상
//! `work >= 0`, `pause >= 0`, `work + pause <= elapsed`를 만족하는 값을 돌려줍니다.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

use crate::models::PauseInterval;

/// 계산 결과 (초 단위, 항상 0 이상)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Durations {
    pub work_seconds: i64,
    pub pause_seconds: i64,
}

/// 근무/휴식 시간을 계산합니다.
///
/// 열린 휴식 구간(`end == None`)은 `effective_end`까지 진행 중인 것으로 봅니다.
/// 닫힌 세션에 열린 휴식이 남아 있는 경우도 같은 방식으로 닫아서 셉니다.
pub fn compute_durations(
    clock_in: DateTime<Utc>,
    clock_out: Option<DateTime<Utc>>,
    pauses: &[PauseInterval],
    now: Option<DateTime<Utc>>,
) -> Durations {
    let effective_end = clock_out.or(now).unwrap_or_else(Utc::now);
    let elapsed_ms = (effective_end - clock_in).num_milliseconds().max(0);
    let window_end = effective_end.max(clock_in);

    // 세션 창으로 잘라낸 뒤 시작 시각 순으로 정렬
    let mut clamped: Vec<(DateTime<Utc>, DateTime<Utc>)> = pauses
        .iter()
        .filter_map(|pause| {
            let start = pause.start.max(clock_in);
            let end = pause.end.unwrap_or(effective_end).min(window_end);
            (end > start).then_some((start, end))
        })
        .collect();
    clamped.sort_by_key(|(start, _)| *start);

    // 겹치는 구간은 합쳐서 한 번만 셉니다.
    let mut pause_ms: i64 = 0;
    let mut current: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for (start, end) in clamped {
        current = match current {
            Some((cur_start, cur_end)) if start <= cur_end => Some((cur_start, cur_end.max(end))),
            Some((cur_start, cur_end)) => {
                pause_ms += (cur_end - cur_start).num_milliseconds();
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((cur_start, cur_end)) = current {
        pause_ms += (cur_end - cur_start).num_milliseconds();
    }

    let pause_ms = pause_ms.clamp(0, elapsed_ms);
    Durations {
        work_seconds: (elapsed_ms - pause_ms) / 1000,
        pause_seconds: pause_ms / 1000,
    }
}

/// 오프셋이 있는 시각 형식 (RFC 3339 외)
const AWARE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// 오프셋이 없는 시각 형식. 업무 시간대로 간주합니다.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// 시각 문자열을 절대 시각(UTC)으로 정규화합니다.
///
/// 오프셋이 있으면 그대로 변환하고, 없으면 `tz`(업무 시간대)의 벽시계 시각으로 봅니다.
/// 어떤 형식에도 맞지 않으면 None.
pub fn normalize_timestamp(raw: &str, tz: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in AWARE_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return assume_business_tz(naive, tz);
        }
    }
    None
}

/// 오프셋 없는 벽시계 시각을 `tz` 기준으로 해석해 UTC로 바꿉니다.
///
/// 고정 오프셋이라 모호하거나 존재하지 않는 시각이 없습니다.
/// 표현 범위 끝에서 오프셋을 빼다 넘치면 None.
pub fn assume_business_tz(naive: NaiveDateTime, tz: FixedOffset) -> Option<DateTime<Utc>> {
    naive
        .checked_sub_signed(Duration::seconds(i64::from(tz.local_minus_utc())))
        .map(|utc| Utc.from_utc_datetime(&utc))
}

/// 어떤 시각이 속한 업무일
pub fn business_date(instant: DateTime<Utc>, tz: FixedOffset) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// 업무일 `date`의 벽시계 시각 `time`에 해당하는 절대 시각
///
/// 날짜가 표현 범위 끝이라 넘치면 그쪽 끝(`MIN_UTC`/`MAX_UTC`)으로 붙입니다.
pub fn local_instant(tz: FixedOffset, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    assume_business_tz(date.and_time(time), tz).unwrap_or(if tz.local_minus_utc() > 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(19800).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        local_instant(
            ist(),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        )
    }

    #[test]
    fn full_day_with_lunch_break() {
        let pauses = vec![PauseInterval::closed(at(12, 0), at(12, 30))];
        let d = compute_durations(at(9, 0), Some(at(18, 0)), &pauses, None);
        assert_eq!(d.work_seconds, 8 * 3600 + 30 * 60);
        assert_eq!(d.pause_seconds, 30 * 60);
    }

    #[test]
    fn pause_covering_whole_session_leaves_no_work() {
        let pauses = vec![PauseInterval::closed(at(8, 0), at(19, 0))];
        let d = compute_durations(at(9, 0), Some(at(18, 0)), &pauses, None);
        assert_eq!(d.work_seconds, 0);
        assert_eq!(d.pause_seconds, 9 * 3600);
    }

    #[test]
    fn open_pause_runs_until_now() {
        let pauses = vec![PauseInterval::open(at(13, 0))];
        let d = compute_durations(at(9, 0), None, &pauses, Some(at(14, 0)));
        assert_eq!(d.work_seconds, 4 * 3600);
        assert_eq!(d.pause_seconds, 3600);
    }

    #[test]
    fn open_pause_in_closed_session_is_closed_at_clock_out() {
        let pauses = vec![PauseInterval::open(at(17, 0))];
        let d = compute_durations(at(9, 0), Some(at(18, 0)), &pauses, Some(at(23, 0)));
        assert_eq!(d.pause_seconds, 3600);
        assert_eq!(d.work_seconds, 8 * 3600);
    }

    #[test]
    fn malformed_pauses_never_exceed_elapsed() {
        let pauses = vec![
            PauseInterval::closed(at(11, 0), at(13, 0)),
            PauseInterval::closed(at(12, 0), at(14, 0)),
            PauseInterval::closed(at(16, 0), at(15, 0)),
            PauseInterval::closed(at(7, 0), at(8, 0)),
        ];
        let d = compute_durations(at(9, 0), Some(at(17, 0)), &pauses, None);
        assert_eq!(d.pause_seconds, 3 * 3600);
        assert_eq!(d.work_seconds, 5 * 3600);
        assert!(d.work_seconds + d.pause_seconds <= 8 * 3600);
    }

    #[test]
    fn clock_out_before_clock_in_yields_zero() {
        let d = compute_durations(at(18, 0), Some(at(9, 0)), &[], None);
        assert_eq!(d, Durations::default());
    }

    #[test]
    fn naive_timestamps_are_read_in_business_timezone() {
        let naive = normalize_timestamp("2025-03-10T09:00:00", ist()).unwrap();
        let spaced = normalize_timestamp("2025-03-10 09:00", ist()).unwrap();
        let explicit = normalize_timestamp("2025-03-10T03:30:00Z", ist()).unwrap();
        assert_eq!(naive, explicit);
        assert_eq!(spaced, explicit);
        assert_eq!(naive, at(9, 0));
    }

    #[test]
    fn explicit_offsets_are_respected() {
        let other = normalize_timestamp("2025-03-10T09:00:00+09:00", ist()).unwrap();
        assert_eq!(other, Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        assert!(normalize_timestamp("yesterday", ist()).is_none());
    }

    #[test]
    fn timestamps_at_the_edge_of_the_calendar_are_rejected() {
        assert!(normalize_timestamp("-262143-01-01T00:00:00", ist()).is_none());
        assert!(normalize_timestamp("-262143-01-01T12:00:00", ist()).is_some());
    }

    #[test]
    fn local_instant_saturates_instead_of_overflowing() {
        let first = NaiveDate::MIN;
        assert_eq!(
            local_instant(ist(), first, NaiveTime::from_hms_opt(0, 0, 0).unwrap()),
            DateTime::<Utc>::MIN_UTC
        );
    }

    #[test]
    fn business_date_follows_business_timezone() {
        // 2025-03-10 20:00 UTC is already 01:30 on the 11th in IST
        let late = Utc.with_ymd_and_hms(2025, 3, 10, 20, 0, 0).unwrap();
        assert_eq!(
            business_date(late, ist()),
            NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()
        );
    }
}
