//! Request-sized pipelines: filter, aggregate, smooth, reshape.
//!
//! Each function recomputes its view from the shared [`Dataset`] and returns a
//! value the API serializes as-is.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::aggregate::{
    aggregate_by_date, aggregate_by_region_and_date, notable_summary, sentiment_label_counts,
};
use crate::dataset::Dataset;
use crate::dates::{canonical_date_range, DAY_FORMAT};
use crate::error::DashboardResult;
use crate::models::{
    CorrelationMatrix, CorrelationRow, EventAnnotation, LabelCount, NotableRecord, RegionField,
    SmoothedSeries, StatsSeries, Technique, Topic,
};
use crate::smoothing::{
    build_correlation_table, correlation_matrix, event_annotations, filter_date_range,
    smooth_covid_stats, smooth_region_sentiment, smooth_technique_comparison, smooth_tweet_volume,
};
use crate::table::{reshape_wide_to_long, Table};

#[derive(Debug, Serialize)]
pub struct DatesView {
    pub dates: Vec<String>,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
pub struct StatsGraph {
    pub series: Vec<StatsSeries>,
    pub events: Vec<EventAnnotation>,
}

#[derive(Debug, Serialize)]
pub struct SentimentVolumeGraph {
    pub sentiment: Vec<SmoothedSeries>,
    pub volume: Vec<SmoothedSeries>,
    pub events: Vec<EventAnnotation>,
}

#[derive(Debug, Serialize)]
pub struct CorrelationView {
    pub rows: Vec<CorrelationRow>,
    pub matrix: CorrelationMatrix,
}

#[derive(Debug, Serialize)]
pub struct CountyScore {
    pub county: String,
    pub id: Option<String>,
    pub score: Option<f64>,
}

pub fn dates(dataset: &Dataset) -> DatesView {
    let format = |date: NaiveDate| date.format(DAY_FORMAT).to_string();
    DatesView {
        dates: dataset.dates().map(format).collect(),
        start_date: format(dataset.config.start),
        end_date: format(dataset.config.end),
    }
}

/// Smoothed cases and deaths per country from the start of the window to `date`.
pub fn stats_graph(dataset: &Dataset, date: NaiveDate) -> StatsGraph {
    let config = &dataset.config;
    let end = config.clamp(date);
    StatsGraph {
        series: smooth_covid_stats(
            &dataset.covid_stats,
            dataset.regions(RegionField::Country),
            config.start,
            end,
            config.window,
        ),
        events: event_annotations(&dataset.events, canonical_date_range(config.start, end)),
    }
}

/// Smoothed per-country sentiment from the start of the window to `date`.
pub fn sentiment_graph(
    dataset: &Dataset,
    topic: Topic,
    technique: Technique,
    date: NaiveDate,
) -> Vec<SmoothedSeries> {
    let config = &dataset.config;
    let end = config.clamp(date);
    let records = filter_date_range(&dataset.topic(topic).county_sentiment, config.start, end);
    let aggregates = aggregate_by_region_and_date(
        &records,
        dataset.regions(RegionField::Country),
        RegionField::Country,
        canonical_date_range(config.start, end),
    );
    debug!(%topic, %technique, cells = aggregates.len(), "Aggregated country sentiment");
    smooth_region_sentiment(
        &aggregates,
        technique,
        dataset.regions(RegionField::Country),
        config.start,
        end,
        config.window,
    )
}

pub fn sentiment_vs_volume(
    dataset: &Dataset,
    topic: Topic,
    technique: Technique,
    date: NaiveDate,
) -> DashboardResult<SentimentVolumeGraph> {
    let config = &dataset.config;
    let end = config.clamp(date);
    Ok(SentimentVolumeGraph {
        sentiment: sentiment_graph(dataset, topic, technique, end),
        volume: smooth_tweet_volume(
            &dataset.topic(topic).tweet_counts,
            dataset.regions(RegionField::Country),
            config.start,
            end,
            config.window,
        )?,
        events: event_annotations(&dataset.events, canonical_date_range(config.start, end)),
    })
}

/// Long `date, technique, score` table comparing every technique's smoothed national mean.
pub fn technique_comparison(dataset: &Dataset, topic: Topic, date: NaiveDate) -> DashboardResult<Table> {
    let config = &dataset.config;
    let end = config.clamp(date);
    let records = filter_date_range(&dataset.topic(topic).sentiments, config.start, end);
    let daily = aggregate_by_date(&records, canonical_date_range(config.start, end));
    let wide = smooth_technique_comparison(&daily, config.start, end, config.window)?;

    let techniques: Vec<&str> = Technique::ALL.into_iter().map(Technique::as_str).collect();
    reshape_wide_to_long(&wide, &["date"], &techniques, "technique", "score")
}

pub fn notable_days(
    dataset: &Dataset,
    topic: Topic,
    technique: Technique,
) -> DashboardResult<Vec<NotableRecord>> {
    let data = dataset.topic(topic);
    notable_summary(
        &data.sentiments,
        &data.tweet_counts,
        technique,
        dataset.regions(RegionField::Country),
        dataset.dates(),
    )
}

pub fn correlation(
    dataset: &Dataset,
    topic: Topic,
    technique: Technique,
) -> DashboardResult<CorrelationView> {
    let data = dataset.topic(topic);
    let aggregates = aggregate_by_region_and_date(
        &data.sentiments,
        dataset.regions(RegionField::Country),
        RegionField::Country,
        dataset.dates(),
    );
    let rows = build_correlation_table(
        &aggregates,
        &data.tweet_counts,
        &dataset.covid_stats,
        dataset.regions(RegionField::Country),
        dataset.dates(),
    )?;
    let matrix = correlation_matrix(&rows, technique);
    Ok(CorrelationView { rows, matrix })
}

/// Per-county scores on one date for the choropleth.
pub fn county_sentiment(
    dataset: &Dataset,
    topic: Topic,
    technique: Technique,
    date: NaiveDate,
) -> Vec<CountyScore> {
    dataset
        .topic(topic)
        .county_sentiment
        .iter()
        .filter(|record| record.date == date)
        .filter_map(|record| {
            Some(CountyScore {
                county: record.county.clone()?,
                id: record.county_id.clone(),
                score: *record.scores.get(technique),
            })
        })
        .collect()
}

pub fn label_counts(
    dataset: &Dataset,
    topic: Topic,
    technique: Technique,
    date: NaiveDate,
) -> Vec<LabelCount> {
    sentiment_label_counts(
        &dataset.topic(topic).sentiments,
        date,
        technique,
        dataset.regions(RegionField::Country),
    )
}
