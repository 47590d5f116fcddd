//! Calendar helpers shared by every per-date pass.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{DashboardError, DashboardResult};

/// Canonical day format used by every table and query parameter.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Months the dataset spans, in chronological order. Monthly scans walk this
/// table, so on a tie the earliest month wins.
const MONTHS: [(i32, u32, &str); 13] = [
    (2020, 3, "March 2020"),
    (2020, 4, "April 2020"),
    (2020, 5, "May 2020"),
    (2020, 6, "June 2020"),
    (2020, 7, "July 2020"),
    (2020, 8, "August 2020"),
    (2020, 9, "September 2020"),
    (2020, 10, "October 2020"),
    (2020, 11, "November 2020"),
    (2020, 12, "December 2020"),
    (2021, 1, "January 2021"),
    (2021, 2, "February 2021"),
    (2021, 3, "March 2021"),
];

/// Inclusive run of calendar days. Cloning restarts the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        if current > self.end {
            self.next = None;
            return None;
        }
        self.next = current.succ_opt();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(current) if current <= self.end => (self.end - current).num_days() as usize + 1,
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DateRange {}

/// Every day from `start` to `end` inclusive; empty when `end < start`.
pub fn canonical_date_range(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange {
        next: Some(start),
        end,
    }
}

pub fn parse_day(value: &str) -> DashboardResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DAY_FORMAT)
        .map_err(|_| DashboardError::InvalidDate(value.to_string()))
}

/// True iff `week_start < date <= week_end`.
pub fn is_within_week(week_start: NaiveDate, week_end: NaiveDate, date: NaiveDate) -> bool {
    week_start < date && date <= week_end
}

/// Maps a date to its `"Month Year"` label. Only March 2020 to March 2021 is known.
pub fn month_bucket(date: NaiveDate) -> DashboardResult<&'static str> {
    MONTHS
        .iter()
        .find(|(year, month, _)| date.year() == *year && date.month() == *month)
        .map(|(_, _, label)| *label)
        .ok_or(DashboardError::DateOutOfRange(date))
}

/// Month labels in chronological order.
pub fn supported_months() -> impl Iterator<Item = &'static str> {
    MONTHS.iter().map(|(_, _, label)| *label)
}

/// First day of the 7-day block, counted from `origin`, that holds `date`.
pub fn weekly_anchor(origin: NaiveDate, date: NaiveDate) -> Option<NaiveDate> {
    if date < origin {
        return None;
    }
    let offset = (date - origin).num_days();
    Some(origin + Duration::days(offset - offset % 7))
}

macro_rules! day_format_module {
    ($name:ident, $format:expr) => {
        pub mod $name {
            use chrono::NaiveDate;
            use serde::{Deserialize, Deserializer, Serializer};

            pub const FORMAT: &str = $format;

            pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&date.format(FORMAT))
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
                let raw = String::deserialize(deserializer)?;
                NaiveDate::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
            }
        }
    };
}

day_format_module!(slash_day_first, "%d/%m/%Y");
day_format_module!(dash_day_first, "%d-%m-%Y");
day_format_module!(bracketed, "['%Y-%m-%d']");

#[cfg(test)]
mod tests {
    use super::*;

    fn day(value: &str) -> NaiveDate {
        parse_day(value).unwrap()
    }

    #[test]
    fn date_range_is_inclusive_and_restartable() {
        let range = canonical_date_range(day("2020-03-20"), day("2020-03-26"));
        assert_eq!(range.len(), 7);

        let first: Vec<String> = range.map(|d| d.format(DAY_FORMAT).to_string()).collect();
        let second: Vec<NaiveDate> = range.collect();
        assert_eq!(first.first().map(String::as_str), Some("2020-03-20"));
        assert_eq!(first.last().map(String::as_str), Some("2020-03-26"));
        assert_eq!(second.len(), 7);
    }

    #[test]
    fn reversed_range_is_empty() {
        let range = canonical_date_range(day("2020-03-26"), day("2020-03-20"));
        assert_eq!(range.count(), 0);
    }

    #[test]
    fn week_excludes_start_and_includes_end() {
        let start = day("2020-03-20");
        let end = day("2020-03-27");
        assert!(!is_within_week(start, end, start));
        assert!(is_within_week(start, end, end));
        assert!(is_within_week(start, end, day("2020-03-21")));
        assert!(!is_within_week(start, end, day("2020-03-28")));
    }

    #[test]
    fn month_bucket_covers_dataset_span() {
        assert_eq!(month_bucket(day("2020-03-25")).unwrap(), "March 2020");
        assert_eq!(month_bucket(day("2021-03-01")).unwrap(), "March 2021");
        assert_eq!(month_bucket(day("2020-12-31")).unwrap(), "December 2020");
    }

    #[test]
    fn month_bucket_rejects_dates_outside_span() {
        assert!(matches!(
            month_bucket(day("2021-04-01")),
            Err(DashboardError::DateOutOfRange(_))
        ));
        assert!(month_bucket(day("2020-02-29")).is_err());
    }

    #[test]
    fn weekly_anchor_steps_in_sevens() {
        let origin = day("2020-03-20");
        assert_eq!(weekly_anchor(origin, origin), Some(origin));
        assert_eq!(weekly_anchor(origin, day("2020-03-26")), Some(origin));
        assert_eq!(weekly_anchor(origin, day("2020-03-27")), Some(day("2020-03-27")));
        assert_eq!(weekly_anchor(origin, day("2020-03-19")), None);
    }

    #[test]
    fn parse_day_rejects_other_formats() {
        assert!(parse_day("20/03/2020").is_err());
    }
}
