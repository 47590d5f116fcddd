//! Per-date lookups behind the dashboard's side panels.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::dates::{is_within_week, weekly_anchor};
use crate::error::{DashboardError, DashboardResult};
use crate::models::{CovidStatsRow, EmojiRow, HashtagRow, NewsRow, RNumberRow, RankedItem};

static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((.*?)\)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CovidTotals {
    pub total_cases: f64,
    pub total_deaths: f64,
}

/// Cumulative cases and deaths across every country reporting on `date`.
pub fn covid_totals(stats: &[CovidStatsRow], date: NaiveDate) -> CovidTotals {
    stats
        .iter()
        .filter(|row| row.date == date)
        .fold(
            CovidTotals {
                total_cases: 0.0,
                total_deaths: 0.0,
            },
            |totals, row| CovidTotals {
                total_cases: totals.total_cases + row.cum_cases.unwrap_or(0.0),
                total_deaths: totals.total_deaths + row.cum_deaths.unwrap_or(0.0),
            },
        )
}

/// Midpoint of the weekly R estimate covering `date`, rounded to 2 places.
///
/// Consecutive rows bound the weeks, `(week_i, week_i+1]`. When unsorted rows
/// make weeks overlap, the last non-zero match wins. A date outside every week
/// gives `None`.
pub fn r_number_for(r_numbers: &[RNumberRow], date: NaiveDate) -> Option<f64> {
    r_numbers
        .windows(2)
        .filter(|pair| is_within_week(pair[0].date, pair[1].date, date))
        .map(|pair| ((pair[0].lower + pair[0].upper) / 2.0 * 100.0).round() / 100.0)
        .filter(|average| *average != 0.0)
        .last()
}

/// Text shown in the R indicator.
pub fn r_number_label(r_numbers: &[RNumberRow], date: NaiveDate) -> String {
    match r_number_for(r_numbers, date) {
        Some(average) => format!("~{average}"),
        None => "N/A".to_string(),
    }
}

/// Decodes `[('label', 12), ('other', 3)]` into ranked items.
fn parse_ranked_pairs(text: &str, column: &str) -> DashboardResult<Vec<RankedItem>> {
    PAIR_RE
        .captures_iter(text)
        .map(|captures| {
            let inner = &captures[1];
            let (label, count) = inner.rsplit_once(',').ok_or_else(|| {
                DashboardError::InvalidNumber {
                    column: column.to_string(),
                    value: inner.to_string(),
                }
            })?;
            let count = count
                .trim()
                .parse::<u64>()
                .map_err(|_| DashboardError::InvalidNumber {
                    column: column.to_string(),
                    value: count.to_string(),
                })?;
            Ok(RankedItem {
                label: label.replace('\'', "").trim().to_string(),
                count,
            })
        })
        .collect()
}

pub fn parse_hashtags(text: &str) -> DashboardResult<Vec<RankedItem>> {
    Ok(parse_ranked_pairs(text, "top_ten_hashtags")?
        .into_iter()
        .map(|item| RankedItem {
            label: format!("#{}", item.label),
            count: item.count,
        })
        .collect())
}

pub fn parse_emojis(text: &str) -> DashboardResult<Vec<RankedItem>> {
    parse_ranked_pairs(text, "top_ten_emojis")
}

/// Top hashtags for `date`; empty when the day has no entry.
pub fn hashtags_for(rows: &[HashtagRow], date: NaiveDate) -> DashboardResult<Vec<RankedItem>> {
    match rows.iter().find(|row| row.date == date) {
        Some(row) => parse_hashtags(&row.top_ten_hashtags),
        None => Ok(Vec::new()),
    }
}

/// Top emojis for the 7-day block, counted from `origin`, that holds `date`.
pub fn emojis_for_week(
    rows: &[EmojiRow],
    origin: NaiveDate,
    date: NaiveDate,
) -> DashboardResult<Vec<RankedItem>> {
    let Some(anchor) = weekly_anchor(origin, date) else {
        return Ok(Vec::new());
    };
    match rows.iter().find(|row| row.start_of_week_date == anchor) {
        Some(row) => parse_emojis(&row.top_ten_emojis),
        None => Ok(Vec::new()),
    }
}

pub fn news_for(news: &[NewsRow], date: NaiveDate) -> Vec<&NewsRow> {
    news.iter().filter(|row| row.date == date).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_day;

    fn day(value: &str) -> NaiveDate {
        parse_day(value).unwrap()
    }

    fn r_row(date: &str, lower: f64, upper: f64) -> RNumberRow {
        RNumberRow {
            date: day(date),
            lower,
            upper,
        }
    }

    #[test]
    fn r_number_uses_week_opening_row() {
        let rows = vec![
            r_row("2020-05-01", 0.7, 1.0),
            r_row("2020-05-08", 0.0, 0.0),
            r_row("2020-05-15", 0.8, 1.1),
        ];
        assert_eq!(r_number_for(&rows, day("2020-05-08")), Some(0.85));
        assert_eq!(r_number_label(&rows, day("2020-05-02")), "~0.85");
        assert_eq!(r_number_label(&rows, day("2020-05-01")), "N/A");
        assert_eq!(r_number_label(&rows, day("2020-05-09")), "N/A");
        assert_eq!(r_number_for(&rows, day("2020-05-16")), None);
    }

    #[test]
    fn totals_sum_countries() {
        let row = |country: &str, cases: f64, deaths: f64| CovidStatsRow {
            date: day("2020-04-01"),
            country: country.to_string(),
            new_cases: None,
            new_deaths: None,
            cum_cases: Some(cases),
            cum_deaths: Some(deaths),
        };
        let stats = vec![row("England", 100.0, 10.0), row("Wales", 20.0, 2.0)];
        let totals = covid_totals(&stats, day("2020-04-01"));
        assert_eq!(totals.total_cases, 120.0);
        assert_eq!(totals.total_deaths, 12.0);
        assert_eq!(covid_totals(&stats, day("2020-04-02")).total_cases, 0.0);
    }

    #[test]
    fn hashtags_are_prefixed_and_unquoted() {
        let items = parse_hashtags("[('covid19', 120), ('stayhome', 45)]").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "#covid19");
        assert_eq!(items[0].count, 120);
        assert_eq!(items[1].label, "#stayhome");
    }

    #[test]
    fn malformed_counts_are_rejected() {
        assert!(parse_hashtags("[('covid19', lots)]").is_err());
    }

    #[test]
    fn emojis_follow_weekly_blocks() {
        let rows = vec![EmojiRow {
            start_of_week_date: day("2020-03-27"),
            top_ten_emojis: "[('😷', 30), ('🏠', 12)]".to_string(),
        }];
        let origin = day("2020-03-20");
        let items = emojis_for_week(&rows, origin, day("2020-03-30")).unwrap();
        assert_eq!(items[0].label, "😷");
        assert_eq!(items[1].count, 12);
        assert!(emojis_for_week(&rows, origin, day("2020-03-22")).unwrap().is_empty());
    }

    #[test]
    fn missing_hashtag_day_is_empty() {
        let rows = vec![HashtagRow {
            date: day("2020-03-20"),
            top_ten_hashtags: "[('nhs', 3)]".to_string(),
        }];
        assert!(hashtags_for(&rows, day("2020-03-21")).unwrap().is_empty());
        assert_eq!(hashtags_for(&rows, day("2020-03-20")).unwrap()[0].label, "#nhs");
    }
}
