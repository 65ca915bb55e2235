use chrono::{DateTime, Utc};
use serde::Serialize;

pub const URGENT_WITHIN_DAYS: i64 = 3;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Urgency {
    pub days_remaining: i64,
    pub urgent: bool,
}

/// Days left until `due`, rounded up, and whether that is within the
/// urgent window. Overdue tasks stay urgent.
///
/// Rounding is a ceiling on the millisecond difference: something due
/// later today reports 1, something due 36 hours out reports 2.
pub fn urgency(due: DateTime<Utc>, now: DateTime<Utc>) -> Urgency {
    let diff = (due - now).num_milliseconds();
    let days_remaining = ceil_div(diff, DAY_MILLIS);
    Urgency {
        days_remaining,
        urgent: days_remaining <= URGENT_WITHIN_DAYS,
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    -((-value).div_euclid(divisor))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).single().expect("valid instant")
    }

    #[test]
    fn rounds_partial_days_up() {
        let now = midday();
        let u = urgency(now + Duration::hours(36), now);
        assert_eq!(u.days_remaining, 2);
        assert!(u.urgent);
    }

    #[test]
    fn later_today_is_one_day_and_now_is_zero() {
        let now = midday();
        assert_eq!(urgency(now + Duration::hours(3), now).days_remaining, 1);
        assert_eq!(urgency(now, now).days_remaining, 0);
        assert_eq!(urgency(now + Duration::milliseconds(1), now).days_remaining, 1);
    }

    #[test]
    fn overdue_stays_urgent() {
        let now = midday();
        let u = urgency(now - Duration::hours(36), now);
        assert_eq!(u.days_remaining, -1);
        assert!(u.urgent);

        let u = urgency(now - Duration::days(40), now);
        assert_eq!(u.days_remaining, -40);
        assert!(u.urgent);
    }

    #[test]
    fn urgent_window_is_inclusive() {
        let now = midday();
        assert!(urgency(now + Duration::days(3), now).urgent);
        let u = urgency(now + Duration::days(3) + Duration::minutes(1), now);
        assert_eq!(u.days_remaining, 4);
        assert!(!u.urgent);
    }
}
