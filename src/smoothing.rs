//! Moving averages and the chart-shaped tables built from them.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::dates::DateRange;
use crate::error::DashboardResult;
use crate::models::{
    CorrelationMatrix, CorrelationRow, CovidStatsRow, DailyAggregate, EventAnnotation, EventRow,
    RegionDateAggregate, RegionValue, SmoothedPoint, SmoothedSeries, StatsSeries, Technique,
    TweetCountRow,
};
use crate::table::{Cell, Table};

/// Default trailing window, in rows.
pub const MA_WINDOW: usize = 7;

/// Rows that carry a calendar date.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

macro_rules! impl_dated {
    ($($ty:ty),* $(,)?) => {
        $(impl Dated for $ty {
            fn date(&self) -> NaiveDate {
                self.date
            }
        })*
    };
}

impl_dated!(
    CovidStatsRow,
    TweetCountRow,
    RegionDateAggregate,
    DailyAggregate,
    RegionValue,
    crate::models::SentimentRecord,
    crate::models::NewsRow,
);

/// Keeps rows with `start <= date <= end`.
pub fn filter_date_range<T: Dated + Clone>(rows: &[T], start: NaiveDate, end: NaiveDate) -> Vec<T> {
    rows.iter()
        .filter(|row| (start..=end).contains(&row.date()))
        .cloned()
        .collect()
}

/// Trailing mean over one chronological series.
///
/// The window shrinks to the series length when the series is shorter than
/// `window`. Positions before the first full window are `0.0`. Missing values
/// are left out of their window's mean; a window with no values is `0.0`.
fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<f64> {
    let effective = window.max(1).min(values.len());

    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < effective {
                return 0.0;
            }
            let (sum, count) = values[i + 1 - effective..=i]
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        })
        .collect()
}

/// Rolling mean of each region's subsequence, one series per entry of `regions`.
/// A region with no points yields an empty series.
pub fn rolling_mean_per_region(
    series: &[RegionValue],
    regions: &[String],
    window: usize,
) -> Vec<SmoothedSeries> {
    regions
        .iter()
        .map(|region| {
            let mut points: Vec<&RegionValue> =
                series.iter().filter(|point| point.region == *region).collect();
            points.sort_by_key(|point| point.date);

            let values: Vec<Option<f64>> = points.iter().map(|point| point.value).collect();
            let smoothed = rolling_mean(&values, window);

            SmoothedSeries {
                region: region.clone(),
                points: points
                    .iter()
                    .zip(smoothed)
                    .map(|(point, value)| SmoothedPoint {
                        date: point.date,
                        value,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// 7-day MA of new cases and deaths per country between `start` and `end`.
pub fn smooth_covid_stats(
    stats: &[CovidStatsRow],
    regions: &[String],
    start: NaiveDate,
    end: NaiveDate,
    window: usize,
) -> Vec<StatsSeries> {
    let rows = filter_date_range(stats, start, end);
    let column = |pick: fn(&CovidStatsRow) -> Option<f64>| -> Vec<RegionValue> {
        rows.iter()
            .map(|row| RegionValue {
                region: row.country.clone(),
                date: row.date,
                value: pick(row),
            })
            .collect()
    };

    let cases = rolling_mean_per_region(&column(|row| row.new_cases), regions, window);
    let deaths = rolling_mean_per_region(&column(|row| row.new_deaths), regions, window);

    cases
        .into_iter()
        .zip(deaths)
        .map(|(cases, deaths)| StatsSeries {
            region: cases.region,
            cases: cases.points,
            deaths: deaths.points,
        })
        .collect()
}

/// 7-day MA of tweet volume per country. Every region must have a column.
pub fn smooth_tweet_volume(
    counts: &[TweetCountRow],
    regions: &[String],
    start: NaiveDate,
    end: NaiveDate,
    window: usize,
) -> DashboardResult<Vec<SmoothedSeries>> {
    let rows = filter_date_range(counts, start, end);
    let mut points = Vec::with_capacity(rows.len() * regions.len());
    for row in &rows {
        for region in regions {
            points.push(RegionValue {
                region: region.clone(),
                date: row.date,
                value: Some(row.volume(region)?),
            });
        }
    }
    Ok(rolling_mean_per_region(&points, regions, window))
}

/// 7-day MA of one technique's mean score per region.
pub fn smooth_region_sentiment(
    aggregates: &[RegionDateAggregate],
    technique: Technique,
    regions: &[String],
    start: NaiveDate,
    end: NaiveDate,
    window: usize,
) -> Vec<SmoothedSeries> {
    let points: Vec<RegionValue> = filter_date_range(aggregates, start, end)
        .into_iter()
        .map(|row| RegionValue {
            value: *row.scores.get(technique),
            region: row.region,
            date: row.date,
        })
        .collect();
    rolling_mean_per_region(&points, regions, window)
}

/// Wide `date, nn, vader, textblob, native` table of smoothed national means.
pub fn smooth_technique_comparison(
    daily: &[DailyAggregate],
    start: NaiveDate,
    end: NaiveDate,
    window: usize,
) -> DashboardResult<Table> {
    let rows = filter_date_range(daily, start, end);
    let smoothed: Vec<Vec<f64>> = Technique::ALL
        .into_iter()
        .map(|technique| {
            let values: Vec<Option<f64>> =
                rows.iter().map(|row| *row.scores.get(technique)).collect();
            rolling_mean(&values, window)
        })
        .collect();

    let header = std::iter::once("date").chain(Technique::ALL.into_iter().map(Technique::as_str));
    let mut table = Table::new(header);
    for (i, row) in rows.iter().enumerate() {
        let mut cells = vec![Cell::from(row.date.to_string())];
        cells.extend(smoothed.iter().map(|column| Cell::Number(column[i])));
        table.push_row(cells)?;
    }
    Ok(table)
}

/// Rescales the present values to zero mean and unit population variance.
/// A constant column maps to zeros.
pub fn standardize(values: &mut [Option<f64>]) {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return;
    }
    let mean = present.iter().sum::<f64>() / present.len() as f64;
    let variance =
        present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / present.len() as f64;
    let scale = if variance > 0.0 { variance.sqrt() } else { 1.0 };

    for value in values.iter_mut().flatten() {
        *value = (*value - mean) / scale;
    }
}

type RowField = fn(&mut CorrelationRow) -> &mut Option<f64>;

/// Columns of a correlation row that get standardized per region.
const SCALED_FIELDS: [RowField; 3] = [
    |row| &mut row.volume,
    |row| &mut row.cases,
    |row| &mut row.deaths,
];

/// Joins standardized volume, cases and deaths with the sentiment aggregate,
/// keyed on (date, region). Rows come out date-major, region-minor.
///
/// Dates missing from the tweet counts count as zero volume; missing stats
/// stay `None`.
pub fn build_correlation_table(
    sentiment: &[RegionDateAggregate],
    counts: &[TweetCountRow],
    stats: &[CovidStatsRow],
    regions: &[String],
    dates: DateRange,
) -> DashboardResult<Vec<CorrelationRow>> {
    let counts_by_date: HashMap<NaiveDate, &TweetCountRow> =
        counts.iter().map(|row| (row.date, row)).collect();
    let stats_by_key: HashMap<(NaiveDate, &str), &CovidStatsRow> = stats
        .iter()
        .map(|row| ((row.date, row.country.as_str()), row))
        .collect();
    let sentiment_by_key: HashMap<(NaiveDate, &str), &RegionDateAggregate> = sentiment
        .iter()
        .map(|row| ((row.date, row.region.as_str()), row))
        .collect();

    let mut rows = Vec::with_capacity(dates.len() * regions.len());
    for date in dates {
        for region in regions {
            let key = (date, region.as_str());
            let volume = match counts_by_date.get(&date) {
                Some(row) => row.volume(region)?,
                None => 0.0,
            };
            let stats_row = stats_by_key.get(&key);
            rows.push(CorrelationRow {
                region: region.clone(),
                date,
                volume: Some(volume),
                cases: stats_row.and_then(|row| row.new_cases),
                deaths: stats_row.and_then(|row| row.new_deaths),
                sentiment: sentiment_by_key
                    .get(&key)
                    .map(|row| row.scores.clone())
                    .unwrap_or_default(),
            });
        }
    }

    for region in regions {
        let positions: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.region == *region)
            .map(|(i, _)| i)
            .collect();

        for field in SCALED_FIELDS {
            let mut column: Vec<Option<f64>> =
                positions.iter().map(|&i| *field(&mut rows[i])).collect();
            standardize(&mut column);
            for (&i, value) in positions.iter().zip(column) {
                *field(&mut rows[i]) = value;
            }
        }
    }

    Ok(rows)
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }

    if var_x == 0.0 || var_y == 0.0 {
        None
    } else {
        Some(cov / (var_x.sqrt() * var_y.sqrt()))
    }
}

const CORRELATION_LABELS: [&str; 4] = ["volume", "cases", "deaths", "sentiment"];

/// Pearson matrix over volume, cases, deaths and `technique`'s sentiment,
/// using every row where both members of a pair are present.
pub fn correlation_matrix(rows: &[CorrelationRow], technique: Technique) -> CorrelationMatrix {
    let metric = |row: &CorrelationRow, column: usize| match column {
        0 => row.volume,
        1 => row.cases,
        2 => row.deaths,
        _ => *row.sentiment.get(technique),
    };

    let values = (0..CORRELATION_LABELS.len())
        .map(|left| {
            (0..CORRELATION_LABELS.len())
                .map(|right| {
                    let pairs: Vec<(f64, f64)> = rows
                        .iter()
                        .filter_map(|row| Some((metric(row, left)?, metric(row, right)?)))
                        .collect();
                    pearson(&pairs)
                })
                .collect()
        })
        .collect();

    CorrelationMatrix {
        labels: CORRELATION_LABELS.iter().map(|name| name.to_string()).collect(),
        values,
    }
}

/// One annotation per date; the first event listed for a date wins.
pub fn event_annotations(events: &[EventRow], dates: DateRange) -> Vec<EventAnnotation> {
    let mut by_date: HashMap<NaiveDate, &str> = HashMap::new();
    for event in events {
        by_date.entry(event.date).or_insert(event.event.as_str());
    }

    dates
        .map(|date| EventAnnotation {
            date,
            label: by_date.get(&date).map(|label| label.to_string()).unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::{canonical_date_range, parse_day};
    use crate::models::PerTechnique;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn day(value: &str) -> NaiveDate {
        parse_day(value).unwrap()
    }

    fn series(region: &str, values: &[f64]) -> Vec<RegionValue> {
        let start = day("2020-03-20");
        values
            .iter()
            .enumerate()
            .map(|(i, value)| RegionValue {
                region: region.to_string(),
                date: start + Duration::days(i as i64),
                value: Some(*value),
            })
            .collect()
    }

    fn stats_row(date: &str, country: &str, cases: f64, deaths: f64) -> CovidStatsRow {
        CovidStatsRow {
            date: day(date),
            country: country.to_string(),
            new_cases: Some(cases),
            new_deaths: Some(deaths),
            cum_cases: None,
            cum_deaths: None,
        }
    }

    #[test]
    fn full_week_averages_all_seven_rows() {
        let points = series("England", &[10.0, 20.0, 30.0, 0.0, 0.0, 0.0, 0.0]);
        let smoothed = rolling_mean_per_region(&points, &["England".to_string()], MA_WINDOW);

        let values: Vec<f64> = smoothed[0].points.iter().map(|p| p.value).collect();
        assert_eq!(values[..6], [0.0; 6]);
        assert!((values[6] - 60.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn short_series_falls_back_to_its_length() {
        let points = series("Wales", &[10.0, 20.0, 30.0]);
        let smoothed = rolling_mean_per_region(&points, &["Wales".to_string()], MA_WINDOW);

        let values: Vec<f64> = smoothed[0].points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![0.0, 0.0, 20.0]);
    }

    #[test]
    fn regions_are_smoothed_independently() {
        let mut points = series("England", &[1.0; 8]);
        points.extend(series("Wales", &[2.0, 4.0]));
        let regions = vec!["England".to_string(), "Wales".to_string(), "Scotland".to_string()];
        let smoothed = rolling_mean_per_region(&points, &regions, MA_WINDOW);

        assert_eq!(smoothed[0].points.len(), 8);
        assert_eq!(smoothed[0].points[7].value, 1.0);
        assert_eq!(smoothed[1].points[1].value, 3.0);
        assert!(smoothed[2].points.is_empty());
    }

    #[test]
    fn missing_values_are_left_out_of_the_window() {
        let mut points = series("England", &[2.0, 0.0, 4.0]);
        points[1].value = None;
        let smoothed = rolling_mean_per_region(&points, &["England".to_string()], 3);
        assert_eq!(smoothed[0].points[2].value, 3.0);
    }

    #[test]
    fn date_filter_is_inclusive() {
        let rows = vec![
            stats_row("2020-03-19", "England", 1.0, 0.0),
            stats_row("2020-03-20", "England", 2.0, 0.0),
            stats_row("2020-03-21", "England", 3.0, 0.0),
            stats_row("2020-03-22", "England", 4.0, 0.0),
        ];
        let kept = filter_date_range(&rows, day("2020-03-20"), day("2020-03-21"));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].new_cases, Some(2.0));

        assert!(filter_date_range(&rows, day("2021-01-01"), day("2021-01-02")).is_empty());
    }

    #[test]
    fn stats_smoothing_keeps_cases_and_deaths_apart() {
        let rows = vec![
            stats_row("2020-03-20", "England", 10.0, 1.0),
            stats_row("2020-03-21", "England", 20.0, 3.0),
        ];
        let series = smooth_covid_stats(
            &rows,
            &["England".to_string()],
            day("2020-03-20"),
            day("2020-03-21"),
            MA_WINDOW,
        );
        assert_eq!(series[0].cases[1].value, 15.0);
        assert_eq!(series[0].deaths[1].value, 2.0);
    }

    #[test]
    fn volume_smoothing_requires_region_columns() {
        let mut volumes = BTreeMap::new();
        volumes.insert("England".to_string(), 4.0);
        let rows = vec![TweetCountRow {
            date: day("2020-03-20"),
            volumes,
        }];
        let ok = smooth_tweet_volume(
            &rows,
            &["England".to_string()],
            day("2020-03-20"),
            day("2020-03-20"),
            MA_WINDOW,
        )
        .unwrap();
        assert_eq!(ok[0].points[0].value, 4.0);

        let err = smooth_tweet_volume(
            &rows,
            &["Wales".to_string()],
            day("2020-03-20"),
            day("2020-03-20"),
            MA_WINDOW,
        );
        assert!(err.is_err());
    }

    #[test]
    fn standardize_uses_population_variance() {
        let mut values = vec![Some(1.0), None, Some(3.0)];
        standardize(&mut values);
        assert_eq!(values, vec![Some(-1.0), None, Some(1.0)]);

        let mut flat = vec![Some(5.0), Some(5.0)];
        standardize(&mut flat);
        assert_eq!(flat, vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn correlation_rows_join_on_keys() {
        let regions = vec!["England".to_string(), "Wales".to_string()];
        let dates = canonical_date_range(day("2020-03-20"), day("2020-03-21"));

        let mut scores = PerTechnique::default();
        scores.set(Technique::Vader, Some(0.25));
        let sentiment = vec![RegionDateAggregate {
            date: day("2020-03-21"),
            region: "Wales".to_string(),
            scores,
            polarity: PerTechnique::default(),
        }];

        let mut volumes = BTreeMap::new();
        volumes.insert("England".to_string(), 10.0);
        volumes.insert("Wales".to_string(), 2.0);
        let counts = vec![TweetCountRow {
            date: day("2020-03-20"),
            volumes,
        }];

        let stats = vec![
            stats_row("2020-03-21", "Wales", 4.0, 1.0),
            stats_row("2020-03-20", "Wales", 2.0, 1.0),
        ];

        let rows = build_correlation_table(&sentiment, &counts, &stats, &regions, dates).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].region, "Wales");
        assert_eq!(rows[1].volume, Some(1.0));
        assert_eq!(rows[3].volume, Some(-1.0));
        assert_eq!(rows[1].cases, Some(-1.0));
        assert_eq!(rows[3].cases, Some(1.0));
        assert_eq!(rows[3].deaths, Some(0.0));
        assert_eq!(rows[0].cases, None);
        assert_eq!(*rows[3].sentiment.get(Technique::Vader), Some(0.25));
        assert_eq!(*rows[2].sentiment.get(Technique::Vader), None);
    }

    #[test]
    fn correlation_matrix_has_unit_diagonal() {
        let rows: Vec<CorrelationRow> = (0..4)
            .map(|i| {
                let x = i as f64;
                let mut sentiment = PerTechnique::default();
                sentiment.set(Technique::Nn, Some(-x));
                CorrelationRow {
                    region: "England".to_string(),
                    date: day("2020-03-20") + Duration::days(i),
                    volume: Some(x),
                    cases: Some(2.0 * x),
                    deaths: Some(1.0),
                    sentiment,
                }
            })
            .collect();
        let matrix = correlation_matrix(&rows, Technique::Nn);

        assert_eq!(matrix.labels, ["volume", "cases", "deaths", "sentiment"]);
        assert!((matrix.values[0][0].unwrap() - 1.0).abs() < 1e-9);
        assert!((matrix.values[0][1].unwrap() - 1.0).abs() < 1e-9);
        assert!((matrix.values[0][3].unwrap() + 1.0).abs() < 1e-9);
        assert_eq!(matrix.values[0][2], None);
    }

    #[test]
    fn annotations_align_with_dates() {
        let events = vec![EventRow {
            date: day("2020-03-23"),
            event: "National lockdown announced".to_string(),
        }];
        let dates = canonical_date_range(day("2020-03-22"), day("2020-03-24"));
        let annotations = event_annotations(&events, dates);

        assert_eq!(annotations.len(), 3);
        assert_eq!(annotations[0].label, "");
        assert_eq!(annotations[1].label, "National lockdown announced");
    }

    #[test]
    fn technique_comparison_is_wide_by_technique() {
        let mut scores = PerTechnique::default();
        scores.set(Technique::Textblob, Some(0.5));
        let daily = vec![DailyAggregate {
            date: day("2020-03-20"),
            scores,
            polarity: PerTechnique::default(),
        }];
        let table =
            smooth_technique_comparison(&daily, day("2020-03-20"), day("2020-03-20"), MA_WINDOW)
                .unwrap();
        assert_eq!(table.columns(), ["date", "nn", "vader", "textblob", "native"]);
        assert_eq!(table.cell(0, "textblob").unwrap(), &Cell::Number(0.5));
        assert_eq!(table.cell(0, "nn").unwrap(), &Cell::Number(0.0));
    }
}
