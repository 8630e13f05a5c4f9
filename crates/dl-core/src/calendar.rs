//! Day strings, day windows and the small calendar helpers built on them.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use dl_common::{Error, Result};

/// Format of day strings (`YYYY-MM-DD`).
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parse an ISO day string.
pub fn parse_day(day: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(day, DAY_FORMAT)
        .map_err(|e| Error::InvalidDay(format!("{day}: {e}")))
}

pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// The current local day.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Whether `day` is still accumulating samples.
pub fn is_live(day: NaiveDate) -> bool {
    day == today()
}

pub fn yesterday() -> NaiveDate {
    today() - Duration::days(1)
}

/// Most recent business day before today.
pub fn last_business_day() -> NaiveDate {
    last_business_day_before(today())
}

/// Most recent Monday-Friday day strictly before `day`.
pub fn last_business_day_before(day: NaiveDate) -> NaiveDate {
    let weekday = i64::from(day.weekday().num_days_from_monday());
    let shift = ((weekday + 6) % 7 - 3).max(1);
    day - Duration::days(shift)
}

/// Inclusive epoch-second window `[start, stop]` of a local day.
///
/// The day's 00:00:00 and 23:59:59 wall-clock instants are read as if they
/// were UTC and then shifted by the current distance between the system
/// clock and the local wall clock.
pub fn day_window(day: NaiveDate) -> (i64, i64) {
    let now = Local::now();
    let correction = now.timestamp() - now.naive_local().and_utc().timestamp();
    let start = NaiveDateTime::new(day, NaiveTime::MIN);
    let stop = start + Duration::seconds(24 * 60 * 60 - 1);
    (
        start.and_utc().timestamp() + correction,
        stop.and_utc().timestamp() + correction,
    )
}

/// Iterator over consecutive days, both ends inclusive.
#[derive(Debug, Clone)]
pub struct DateWalker {
    next: Option<NaiveDate>,
    stop: NaiveDate,
}

impl Iterator for DateWalker {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let day = self.next.filter(|day| *day <= self.stop)?;
        self.next = day.succ_opt();
        Some(day)
    }
}

/// Walk from `start` through `stop`.
pub fn datewalker(start: NaiveDate, stop: NaiveDate) -> DateWalker {
    DateWalker {
        next: Some(start),
        stop,
    }
}

/// Walk every day of a `YYYY-MM` month, first through last.
pub fn monthwalker(month: &str) -> Result<DateWalker> {
    let first = NaiveDate::parse_from_str(&format!("{month}-01"), DAY_FORMAT)
        .map_err(|e| Error::InvalidDay(format!("{month}: {e}")))?;
    let (year, next_month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    let last = NaiveDate::from_ymd_opt(year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| Error::InvalidDay(format!("{month}: no following month")))?;
    Ok(datewalker(first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_day("2024-13-01"), Err(Error::InvalidDay(_))));
        assert!(matches!(parse_day("yesterday"), Err(Error::InvalidDay(_))));
        assert_eq!(format_day(day("2024-03-05")), "2024-03-05");
    }

    #[test]
    fn window_covers_one_day() {
        let (start, stop) = day_window(day("2024-03-05"));
        assert_eq!(stop - start, 86_399);
        let (next_start, _) = day_window(day("2024-03-06"));
        assert_eq!(next_start - start, 86_400);
    }

    #[test]
    fn today_is_live() {
        assert!(is_live(today()));
        assert!(!is_live(yesterday()));
    }

    #[test]
    fn walks_include_both_ends() {
        let days: Vec<_> = datewalker(day("2024-02-27"), day("2024-03-02")).collect();
        assert_eq!(
            days,
            vec![
                day("2024-02-27"),
                day("2024-02-28"),
                day("2024-02-29"),
                day("2024-03-01"),
                day("2024-03-02")
            ]
        );
        let single: Vec<_> = datewalker(day("2024-03-05"), day("2024-03-05")).collect();
        assert_eq!(single, vec![day("2024-03-05")]);
        assert_eq!(datewalker(day("2024-03-06"), day("2024-03-05")).count(), 0);
    }

    #[test]
    fn walk_ends_at_last_representable_day() {
        assert_eq!(datewalker(NaiveDate::MAX, NaiveDate::MAX).count(), 1);
    }

    #[test]
    fn month_walk_handles_year_end_and_leap_years() {
        assert_eq!(monthwalker("2024-02").unwrap().count(), 29);
        assert_eq!(monthwalker("2023-02").unwrap().count(), 28);
        let december: Vec<_> = monthwalker("2023-12").unwrap().collect();
        assert_eq!(december.len(), 31);
        assert_eq!(december.first(), Some(&day("2023-12-01")));
        assert_eq!(december.last(), Some(&day("2023-12-31")));
        assert!(monthwalker("2023-13").is_err());
    }

    #[test]
    fn business_day_skips_weekends() {
        // 2024-03-04 is a Monday
        assert_eq!(last_business_day_before(day("2024-03-04")), day("2024-03-01"));
        assert_eq!(last_business_day_before(day("2024-03-05")), day("2024-03-04"));
        assert_eq!(last_business_day_before(day("2024-03-09")), day("2024-03-08"));
        assert_eq!(last_business_day_before(day("2024-03-10")), day("2024-03-08"));
    }
}
