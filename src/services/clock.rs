//! 현재 시각과 업무 시간대를 제공하는 시계 추상화.
//!
//! 엔진은 `Utc::now()`를 직접 부르지 않고 `Clock`을 거칩니다.
//! 테스트에서는 `ManualClock`으로 시각을 고정하거나 앞으로 돌립니다.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use std::sync::RwLock;

use super::time_math;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn business_tz(&self) -> FixedOffset;

    /// 현재 업무일
    fn today(&self) -> NaiveDate {
        time_math::business_date(self.now(), self.business_tz())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: FixedOffset,
}

impl SystemClock {
    pub fn new(tz: FixedOffset) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn business_tz(&self) -> FixedOffset {
        self.tz
    }
}

/// 손으로 움직이는 시계 (테스트용)
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
    tz: FixedOffset,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, tz: FixedOffset) -> Self {
        Self {
            now: RwLock::new(now),
            tz,
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }

    fn business_tz(&self) -> FixedOffset {
        self.tz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let tz = FixedOffset::east_opt(19800).unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap();
        let clock = ManualClock::new(start, tz);
        assert_eq!(clock.now(), start);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());

        // 18:00 UTC + 1h = 00:30 IST on the next day
        clock.advance(Duration::hours(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
    }
}
