//! D-Day labels: signed day counts rendered as "D-3", "D-Day", "D+12".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DDayKind {
    Today,
    Future,
    Past,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DDay {
    pub label: String,
    #[serde(rename = "type")]
    pub kind: DDayKind,
    pub diff_days: i64,
}

/// Label `target` relative to `today`. Both are calendar dates, so the day
/// difference is exact.
pub fn dday_label(target: NaiveDate, today: NaiveDate) -> DDay {
    let diff_days = (target - today).num_days();
    let (label, kind) = match diff_days {
        0 => ("D-Day".to_string(), DDayKind::Today),
        n if n > 0 => (format!("D-{n}"), DDayKind::Future),
        n => (format!("D+{}", n.unsigned_abs()), DDayKind::Past),
    };
    DDay {
        label,
        kind,
        diff_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn same_day_is_dday() {
        let today = ymd(2025, 6, 15);
        assert_eq!(
            dday_label(today, today),
            DDay {
                label: "D-Day".into(),
                kind: DDayKind::Today,
                diff_days: 0
            }
        );
    }

    #[test]
    fn boundaries_around_today() {
        let today = ymd(2025, 6, 15);
        let tomorrow = dday_label(today + Days::new(1), today);
        assert_eq!(tomorrow.label, "D-1");
        assert_eq!(tomorrow.kind, DDayKind::Future);

        let yesterday = dday_label(today - Days::new(1), today);
        assert_eq!(yesterday.label, "D+1");
        assert_eq!(yesterday.kind, DDayKind::Past);
        assert_eq!(yesterday.diff_days, -1);
    }

    #[test]
    fn across_year_boundary() {
        let label = dday_label(ymd(2026, 1, 1), ymd(2025, 12, 25));
        assert_eq!(label.label, "D-7");
    }

    #[test]
    fn diff_is_monotonic_in_target() {
        let today = ymd(2025, 6, 15);
        let start = ymd(2024, 1, 1);
        let mut previous = None;
        for offset in 0..1000 {
            let diff = dday_label(start + Days::new(offset), today).diff_days;
            if let Some(prev) = previous {
                assert_eq!(diff, prev + 1);
            }
            previous = Some(diff);
        }
    }

    #[test]
    fn serialises_kind_as_type() {
        let today = ymd(2025, 6, 15);
        let value = serde_json::to_value(dday_label(ymd(2025, 6, 10), today)).unwrap();
        assert_eq!(value["type"], "past");
        assert_eq!(value["label"], "D+5");
        assert_eq!(value["diff_days"], -5);
    }
}
