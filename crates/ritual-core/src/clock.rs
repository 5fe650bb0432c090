//! Calendar-day boundaries. Day-keyed logic (D-Day, daily picks) reads "today"
//! once per invocation through these helpers.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Korea Standard Time, UTC+09:00.
pub const KST_OFFSET_HOURS: i32 = 9;

/// Fixed offset for a whole number of hours east of UTC, if representable.
pub fn offset_hours(hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(hours.checked_mul(3600)?)
}

pub fn kst() -> FixedOffset {
    offset_hours(KST_OFFSET_HOURS).unwrap_or_else(|| Utc.fix())
}

/// The calendar date of `now` as seen at `offset`.
pub fn today_in(offset: &FixedOffset, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(offset).date_naive()
}

/// Whole calendar days from the local date of `at` to `today`.
pub fn days_since(at: DateTime<Utc>, today: NaiveDate, offset: &FixedOffset) -> i64 {
    (today - today_in(offset, at)).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kst_day_starts_at_fifteen_utc() {
        let before = Utc.with_ymd_and_hms(2025, 6, 14, 14, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 6, 14, 15, 0, 0).unwrap();
        assert_eq!(
            today_in(&kst(), before),
            NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()
        );
        assert_eq!(
            today_in(&kst(), after),
            NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
        );
    }

    #[test]
    fn days_since_uses_local_dates() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        // 23:30 KST on the 14th.
        let late_yesterday = Utc.with_ymd_and_hms(2025, 6, 14, 14, 30, 0).unwrap();
        assert_eq!(days_since(late_yesterday, today, &kst()), 1);
    }

    #[test]
    fn absurd_offsets_are_rejected() {
        assert!(offset_hours(30).is_none());
        assert!(offset_hours(-5).is_some());
    }
}
