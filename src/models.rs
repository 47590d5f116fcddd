use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{DashboardError, DashboardResult};

/// The four constituent countries, in the order every per-country table uses.
pub const COUNTRIES: [&str; 4] = ["England", "Scotland", "Northern Ireland", "Wales"];

/// Tweet collection a dataset was scraped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Covid,
    Lockdown,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Covid => "covid",
            Topic::Lockdown => "lockdown",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment scoring method whose outputs the dashboard compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Technique {
    Nn,
    Vader,
    Textblob,
    Native,
}

impl Technique {
    pub const ALL: [Technique; 4] = [
        Technique::Nn,
        Technique::Vader,
        Technique::Textblob,
        Technique::Native,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Technique::Nn => "nn",
            Technique::Vader => "vader",
            Technique::Textblob => "textblob",
            Technique::Native => "native",
        }
    }

    /// Per-tweet score column, e.g. `nn-score`.
    pub fn score_column(self) -> String {
        format!("{}-score", self.as_str())
    }

    /// Pre-aggregated score column, e.g. `nn-score_avg`.
    pub fn avg_column(self) -> String {
        format!("{}-score_avg", self.as_str())
    }

    /// Predicted label column, e.g. `nn-predictions`.
    pub fn prediction_column(self) -> String {
        format!("{}-predictions", self.as_str())
    }

    fn index(self) -> usize {
        match self {
            Technique::Nn => 0,
            Technique::Vader => 1,
            Technique::Textblob => 2,
            Technique::Native => 3,
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicted sentiment class of one tweet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Neg,
    Neu,
    Pos,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 3] = [SentimentLabel::Neg, SentimentLabel::Neu, SentimentLabel::Pos];

    pub fn polarity(self) -> i32 {
        match self {
            SentimentLabel::Neg => -1,
            SentimentLabel::Neu => 0,
            SentimentLabel::Pos => 1,
        }
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "neg" => Ok(SentimentLabel::Neg),
            "neu" => Ok(SentimentLabel::Neu),
            "pos" => Ok(SentimentLabel::Pos),
            other => Err(format!("unknown sentiment label {other:?}")),
        }
    }
}

/// Which column of a sentiment record names its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionField {
    County,
    Country,
}

/// One value per technique, serialized as `{"nn": .., "vader": .., ..}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerTechnique<T>([T; 4]);

impl<T> PerTechnique<T> {
    pub fn get(&self, technique: Technique) -> &T {
        &self.0[technique.index()]
    }

    pub fn set(&mut self, technique: Technique, value: T) {
        self.0[technique.index()] = value;
    }
}

impl<T: Serialize> Serialize for PerTechnique<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        for technique in Technique::ALL {
            map.serialize_entry(technique.as_str(), self.get(technique))?;
        }
        map.end()
    }
}

/// One tweet (or one pre-aggregated county-day) with its per-technique output.
#[derive(Debug, Clone, Default)]
pub struct SentimentRecord {
    pub date: NaiveDate,
    pub country: Option<String>,
    pub county: Option<String>,
    pub county_id: Option<String>,
    pub scores: PerTechnique<Option<f64>>,
    pub labels: PerTechnique<Option<SentimentLabel>>,
}

impl SentimentRecord {
    pub fn region(&self, field: RegionField) -> Option<&str> {
        match field {
            RegionField::County => self.county.as_deref(),
            RegionField::Country => self.country.as_deref(),
        }
    }
}

/// Mean score and mean label polarity per technique for one (date, region) cell.
/// `None` means the cell had no usable records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionDateAggregate {
    pub date: NaiveDate,
    pub region: String,
    pub scores: PerTechnique<Option<f64>>,
    pub polarity: PerTechnique<Option<f64>>,
}

/// Same as [`RegionDateAggregate`] but pooled across every region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub scores: PerTechnique<Option<f64>>,
    pub polarity: PerTechnique<Option<f64>>,
}

/// Daily tweet volume, one column per country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetCountRow {
    pub date: NaiveDate,
    pub volumes: BTreeMap<String, f64>,
}

impl TweetCountRow {
    pub fn volume(&self, region: &str) -> DashboardResult<f64> {
        self.volumes
            .get(region)
            .copied()
            .ok_or_else(|| DashboardError::UnknownRegion(region.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovidStatsRow {
    pub date: NaiveDate,
    pub country: String,
    #[serde(rename = "newCasesByPublishDate", default)]
    pub new_cases: Option<f64>,
    #[serde(rename = "newDeathsByDeathDate", default)]
    pub new_deaths: Option<f64>,
    #[serde(rename = "cumCasesByPublishDate", default)]
    pub cum_cases: Option<f64>,
    #[serde(rename = "cumDeathsByDeathDate", default)]
    pub cum_deaths: Option<f64>,
}

/// Weekly R-number estimate; the file dates rows `dd/mm/yyyy`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RNumberRow {
    #[serde(with = "crate::dates::slash_day_first")]
    pub date: NaiveDate,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    #[serde(rename = "Date", with = "crate::dates::dash_day_first")]
    pub date: NaiveDate,
    #[serde(rename = "Event")]
    pub event: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Headline")]
    pub headline: String,
    #[serde(rename = "URL")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HashtagRow {
    pub date: NaiveDate,
    pub top_ten_hashtags: String,
}

/// Weekly emoji ranking; the week column is written as `['yyyy-mm-dd']`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmojiRow {
    #[serde(with = "crate::dates::bracketed")]
    pub start_of_week_date: NaiveDate,
    pub top_ten_emojis: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SmoothedPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmoothedSeries {
    pub region: String,
    pub points: Vec<SmoothedPoint>,
}

/// Input point for smoothing; `value` is `None` where a cell had no data.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionValue {
    pub region: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Winner of a superlative scan: the period key and the winning metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notable<K> {
    pub key: K,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotableKind {
    HighestTweetVolumeDay,
    HighestTweetVolumeMonth,
    HighestPositiveSentimentRatioDay,
    HighestPositiveSentimentRatioMonth,
    HighestNegativeSentimentRatioDay,
    HighestNegativeSentimentRatioMonth,
}

impl NotableKind {
    pub fn title(self) -> &'static str {
        match self {
            NotableKind::HighestTweetVolumeDay => "Highest Tweet Volume Day",
            NotableKind::HighestTweetVolumeMonth => "Highest Tweet Volume Month",
            NotableKind::HighestPositiveSentimentRatioDay => "Highest Positive Sentiment Ratio Day",
            NotableKind::HighestPositiveSentimentRatioMonth => {
                "Highest Positive Sentiment Ratio Month"
            }
            NotableKind::HighestNegativeSentimentRatioDay => "Highest Negative Sentiment Ratio Day",
            NotableKind::HighestNegativeSentimentRatioMonth => {
                "Highest Negative Sentiment Ratio Month"
            }
        }
    }
}

/// One line of the notable-days table; `period` is empty when nothing qualified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotableRecord {
    pub kind: NotableKind,
    pub technique: Technique,
    pub period: Option<String>,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationRow {
    pub region: String,
    pub date: NaiveDate,
    pub volume: Option<f64>,
    pub cases: Option<f64>,
    pub deaths: Option<f64>,
    pub sentiment: PerTechnique<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub region: String,
    pub label: SentimentLabel,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedItem {
    pub label: String,
    pub count: u64,
}

/// Smoothed new cases and deaths for one country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSeries {
    pub region: String,
    pub cases: Vec<SmoothedPoint>,
    pub deaths: Vec<SmoothedPoint>,
}

/// Chart annotation for one canonical date; `label` is empty on quiet days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventAnnotation {
    pub date: NaiveDate,
    pub label: String,
}

/// Pairwise Pearson coefficients; `None` where a pair has too little variation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}
