use std::collections::HashMap;

use chrono::NaiveDate;

use crate::dates::{month_bucket, supported_months, DateRange};
use crate::error::DashboardResult;
use crate::models::{
    DailyAggregate, LabelCount, Notable, NotableKind, NotableRecord, PerTechnique,
    RegionDateAggregate, RegionField, SentimentLabel, SentimentRecord, Technique, TweetCountRow,
};

/// Per-technique means over `records`, `None` where no record carries a value.
fn technique_means(
    records: &[&SentimentRecord],
) -> (PerTechnique<Option<f64>>, PerTechnique<Option<f64>>) {
    let mut scores = PerTechnique::default();
    let mut polarity = PerTechnique::default();

    for technique in Technique::ALL {
        scores.set(
            technique,
            mean(records.iter().filter_map(|record| *record.scores.get(technique))),
        );
        polarity.set(
            technique,
            mean(
                records
                    .iter()
                    .filter_map(|record| record.labels.get(technique).map(|l| l.polarity() as f64)),
            ),
        );
    }

    (scores, polarity)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// One row per (date, region) in `dates x regions`, date-major.
pub fn aggregate_by_region_and_date(
    records: &[SentimentRecord],
    regions: &[String],
    region_field: RegionField,
    dates: DateRange,
) -> Vec<RegionDateAggregate> {
    let mut index: HashMap<(NaiveDate, &str), Vec<&SentimentRecord>> = HashMap::new();
    for record in records {
        if let Some(region) = record.region(region_field) {
            index.entry((record.date, region)).or_default().push(record);
        }
    }

    let mut rows = Vec::with_capacity(dates.len() * regions.len());
    for date in dates {
        for region in regions {
            let cell = index
                .get(&(date, region.as_str()))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let (scores, polarity) = technique_means(cell);
            rows.push(RegionDateAggregate {
                date,
                region: region.clone(),
                scores,
                polarity,
            });
        }
    }
    rows
}

/// National means per date, regardless of region.
pub fn aggregate_by_date(records: &[SentimentRecord], dates: DateRange) -> Vec<DailyAggregate> {
    let mut index: HashMap<NaiveDate, Vec<&SentimentRecord>> = HashMap::new();
    for record in records {
        index.entry(record.date).or_default().push(record);
    }

    dates
        .map(|date| {
            let cell = index.get(&date).map(Vec::as_slice).unwrap_or_default();
            let (scores, polarity) = technique_means(cell);
            DailyAggregate {
                date,
                scores,
                polarity,
            }
        })
        .collect()
}

/// Picks the first key with a strictly greater value than everything before it.
/// Keys whose value is `None` are skipped; nothing above zero means no winner.
fn first_maximum<K>(candidates: impl Iterator<Item = (K, Option<f64>)>) -> Option<Notable<K>> {
    let mut best: Option<Notable<K>> = None;
    let mut best_value = 0.0;

    for (key, value) in candidates {
        let Some(value) = value else { continue };
        if value > best_value {
            best_value = value;
            best = Some(Notable { key, value });
        }
    }
    best
}

fn label_ratio(total: usize, matching: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(matching as f64 / total as f64)
    }
}

/// Date with the highest share of records labelled `label` by `technique`.
pub fn notable_day_by_label_ratio(
    records: &[SentimentRecord],
    technique: Technique,
    label: SentimentLabel,
    dates: DateRange,
) -> Option<Notable<NaiveDate>> {
    let mut tallies: HashMap<NaiveDate, (usize, usize)> = HashMap::new();
    for record in records {
        let entry = tallies.entry(record.date).or_insert((0, 0));
        entry.0 += 1;
        if *record.labels.get(technique) == Some(label) {
            entry.1 += 1;
        }
    }

    first_maximum(dates.map(|date| {
        let (total, matching) = tallies.get(&date).copied().unwrap_or((0, 0));
        (date, label_ratio(total, matching))
    }))
}

/// Month with the highest share of records labelled `label` by `technique`.
pub fn notable_month_by_label_ratio(
    records: &[SentimentRecord],
    technique: Technique,
    label: SentimentLabel,
) -> DashboardResult<Option<Notable<&'static str>>> {
    let mut tallies: HashMap<&'static str, (usize, usize)> = HashMap::new();
    for record in records {
        let entry = tallies.entry(month_bucket(record.date)?).or_insert((0, 0));
        entry.0 += 1;
        if *record.labels.get(technique) == Some(label) {
            entry.1 += 1;
        }
    }

    Ok(first_maximum(supported_months().map(|month| {
        let (total, matching) = tallies.get(month).copied().unwrap_or((0, 0));
        (month, label_ratio(total, matching))
    })))
}

fn total_volume(row: &TweetCountRow, regions: &[String]) -> DashboardResult<f64> {
    regions
        .iter()
        .try_fold(0.0, |total, region| Ok(total + row.volume(region)?))
}

/// Date with the most tweets summed over `regions`.
pub fn notable_day_by_volume(
    counts: &[TweetCountRow],
    regions: &[String],
    dates: DateRange,
) -> DashboardResult<Option<Notable<NaiveDate>>> {
    let mut by_date: HashMap<NaiveDate, f64> = HashMap::new();
    for row in counts {
        *by_date.entry(row.date).or_insert(0.0) += total_volume(row, regions)?;
    }

    Ok(first_maximum(
        dates.map(|date| (date, by_date.get(&date).copied())),
    ))
}

/// Month with the most tweets summed over `regions` and over every day of the month.
pub fn notable_month_by_volume(
    counts: &[TweetCountRow],
    regions: &[String],
) -> DashboardResult<Option<Notable<&'static str>>> {
    let mut by_month: HashMap<&'static str, f64> = HashMap::new();
    for row in counts {
        *by_month.entry(month_bucket(row.date)?).or_insert(0.0) += total_volume(row, regions)?;
    }

    Ok(first_maximum(
        supported_months().map(|month| (month, by_month.get(month).copied())),
    ))
}

/// The six notable entries shown for one technique.
pub fn notable_summary(
    records: &[SentimentRecord],
    counts: &[TweetCountRow],
    technique: Technique,
    regions: &[String],
    dates: DateRange,
) -> DashboardResult<Vec<NotableRecord>> {
    let day = |notable: Option<Notable<NaiveDate>>| {
        notable.map_or((None, 0.0), |n| (Some(n.key.to_string()), n.value))
    };
    let month = |notable: Option<Notable<&'static str>>| {
        notable.map_or((None, 0.0), |n| (Some(n.key.to_string()), n.value))
    };

    let entries = [
        (
            NotableKind::HighestTweetVolumeDay,
            day(notable_day_by_volume(counts, regions, dates)?),
        ),
        (
            NotableKind::HighestTweetVolumeMonth,
            month(notable_month_by_volume(counts, regions)?),
        ),
        (
            NotableKind::HighestPositiveSentimentRatioDay,
            day(notable_day_by_label_ratio(records, technique, SentimentLabel::Pos, dates)),
        ),
        (
            NotableKind::HighestPositiveSentimentRatioMonth,
            month(notable_month_by_label_ratio(records, technique, SentimentLabel::Pos)?),
        ),
        (
            NotableKind::HighestNegativeSentimentRatioDay,
            day(notable_day_by_label_ratio(records, technique, SentimentLabel::Neg, dates)),
        ),
        (
            NotableKind::HighestNegativeSentimentRatioMonth,
            month(notable_month_by_label_ratio(records, technique, SentimentLabel::Neg)?),
        ),
    ];

    Ok(entries
        .into_iter()
        .map(|(kind, (period, rate))| NotableRecord {
            kind,
            technique,
            period,
            rate,
        })
        .collect())
}

/// Tweets per label per region on one date, label-major (neg, neu, pos).
pub fn sentiment_label_counts(
    records: &[SentimentRecord],
    date: NaiveDate,
    technique: Technique,
    regions: &[String],
) -> Vec<LabelCount> {
    let mut counts: HashMap<(&str, SentimentLabel), usize> = HashMap::new();
    for record in records.iter().filter(|record| record.date == date) {
        let (Some(region), Some(label)) =
            (record.region(RegionField::Country), *record.labels.get(technique))
        else {
            continue;
        };
        *counts.entry((region, label)).or_insert(0) += 1;
    }

    let mut rows = Vec::with_capacity(SentimentLabel::ALL.len() * regions.len());
    for label in SentimentLabel::ALL {
        for region in regions {
            rows.push(LabelCount {
                region: region.clone(),
                label,
                count: counts.get(&(region.as_str(), label)).copied().unwrap_or(0),
            });
        }
    }
    rows
}
