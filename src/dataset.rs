use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::dates::{parse_day, DateRange};
use crate::error::{DashboardError, DashboardResult};
use crate::models::{
    CovidStatsRow, EmojiRow, EventRow, HashtagRow, NewsRow, PerTechnique, RNumberRow,
    RegionField, SentimentLabel, SentimentRecord, Technique, Topic, TweetCountRow, COUNTRIES,
};

/// Every table one topic contributes.
#[derive(Debug, Clone, Default)]
pub struct TopicData {
    /// One record per tweet, with predicted labels.
    pub sentiments: Vec<SentimentRecord>,
    /// One record per county per day, with pre-averaged scores.
    pub county_sentiment: Vec<SentimentRecord>,
    pub tweet_counts: Vec<TweetCountRow>,
    pub hashtags: Vec<HashtagRow>,
    pub emojis: Vec<EmojiRow>,
}

/// All source tables, loaded once and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub config: DashboardConfig,
    pub covid: TopicData,
    pub lockdown: TopicData,
    pub covid_stats: Vec<CovidStatsRow>,
    pub r_numbers: Vec<RNumberRow>,
    pub events: Vec<EventRow>,
    pub news: Vec<NewsRow>,
    pub counties: Vec<String>,
    pub countries: Vec<String>,
    pub geojson: Option<serde_json::Value>,
}

impl Dataset {
    /// An empty dataset; tests fill in the tables they need.
    pub fn empty(config: DashboardConfig) -> Self {
        Self {
            config,
            covid: TopicData::default(),
            lockdown: TopicData::default(),
            covid_stats: Vec::new(),
            r_numbers: Vec::new(),
            events: Vec::new(),
            news: Vec::new(),
            counties: Vec::new(),
            countries: COUNTRIES.iter().map(|c| c.to_string()).collect(),
            geojson: None,
        }
    }

    pub fn load(config: DashboardConfig) -> DashboardResult<Self> {
        let root = config.data_dir.clone();
        info!(data_dir = %root.display(), "Loading dashboard data");

        let mut dataset = Self::empty(config);
        dataset.covid_stats = read_rows(&root.join("covid-data/uk_covid_stats.csv"))?;
        dataset.r_numbers = read_rows(&root.join("covid-data/r_numbers.csv"))?;
        dataset.events = read_rows(&root.join("events/key_events.csv"))?;
        dataset.news = read_rows(&root.join("events/news_timeline.csv"))?;
        dataset.counties = read_counties(&root.join("geojson/uk-district-list-all.csv"))?;
        dataset.geojson = read_json(&root.join("geojson/uk_counties_simpler.json"))?;
        dataset.covid = load_topic(&root, Topic::Covid)?;
        dataset.lockdown = load_topic(&root, Topic::Lockdown)?;

        info!(
            stats = dataset.covid_stats.len(),
            counties = dataset.counties.len(),
            covid_tweets = dataset.covid.sentiments.len(),
            lockdown_tweets = dataset.lockdown.sentiments.len(),
            "Dashboard data loaded"
        );
        Ok(dataset)
    }

    pub fn topic(&self, topic: Topic) -> &TopicData {
        match topic {
            Topic::Covid => &self.covid,
            Topic::Lockdown => &self.lockdown,
        }
    }

    pub fn regions(&self, field: RegionField) -> &[String] {
        match field {
            RegionField::County => &self.counties,
            RegionField::Country => &self.countries,
        }
    }

    pub fn dates(&self) -> DateRange {
        self.config.dates()
    }
}

fn load_topic(root: &Path, topic: Topic) -> DashboardResult<TopicData> {
    let dir = root.join(topic.as_str());
    Ok(TopicData {
        sentiments: read_sentiment_records(&dir.join("all_tweet_sentiments.csv"))?,
        county_sentiment: read_sentiment_records(
            &dir.join("daily_sentiment_county_updated_locations.csv"),
        )?,
        tweet_counts: read_tweet_counts(&dir.join("daily_tweet_count_country.csv"))?,
        hashtags: read_rows(&dir.join("top_ten_hashtags_per_day.csv"))?,
        emojis: read_rows(&dir.join("weekly_emojis_with_colours.csv"))?,
    })
}

/// Opens `path`, or returns `None` when the file is absent so the table stays empty.
fn open_reader(path: &Path) -> DashboardResult<Option<csv::Reader<std::fs::File>>> {
    if !path.exists() {
        warn!(path = %path.display(), "Source file missing, using an empty table");
        return Ok(None);
    }
    let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    Ok(Some(reader))
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> DashboardResult<Vec<T>> {
    let Some(mut reader) = open_reader(path)? else {
        return Ok(Vec::new());
    };
    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        rows.push(result?);
    }
    Ok(rows)
}

fn read_json(path: &Path) -> DashboardResult<Option<serde_json::Value>> {
    if !path.exists() {
        warn!(path = %path.display(), "GeoJSON missing");
        return Ok(None);
    }
    let file = std::fs::File::open(path)?;
    Ok(Some(serde_json::from_reader(std::io::BufReader::new(file))?))
}

/// County names in file order without repeats; the district list names a
/// county once per district.
fn read_counties(path: &Path) -> DashboardResult<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct DistrictRow {
        county: String,
    }

    let mut seen = HashSet::new();
    Ok(read_rows::<DistrictRow>(path)?
        .into_iter()
        .map(|row| row.county)
        .filter(|county| !county.is_empty() && seen.insert(county.clone()))
        .collect())
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

fn required_column(headers: &StringRecord, name: &str) -> DashboardResult<usize> {
    column(headers, name).ok_or_else(|| DashboardError::MissingColumn(name.to_string()))
}

fn parse_number(raw: &str, column: &str) -> DashboardResult<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| DashboardError::InvalidNumber {
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// Accepts `yyyy-mm-dd` with or without a trailing time of day.
fn parse_leading_day(raw: &str) -> DashboardResult<chrono::NaiveDate> {
    parse_day(raw.trim().get(..10).unwrap_or(raw))
}

/// Reads per-tweet or per-county sentiment rows. Score columns may be named
/// `{technique}-score` or `{technique}-score_avg`; labels `{technique}-predictions`.
pub fn read_sentiment_records(path: &Path) -> DashboardResult<Vec<SentimentRecord>> {
    let Some(mut reader) = open_reader(path)? else {
        return Ok(Vec::new());
    };
    let headers = reader.headers()?.clone();

    let date_index = required_column(&headers, "date")?;
    let country_index = column(&headers, "country");
    let county_index = column(&headers, "county");
    let id_index = column(&headers, "id");
    if country_index.is_none() && county_index.is_none() {
        return Err(DashboardError::MissingColumn("country".to_string()));
    }

    let mut score_columns: Vec<(Technique, usize, String)> = Vec::new();
    let mut label_columns: Vec<(Technique, usize)> = Vec::new();
    for technique in Technique::ALL {
        for name in [technique.score_column(), technique.avg_column()] {
            if let Some(index) = column(&headers, &name) {
                score_columns.push((technique, index, name));
                break;
            }
        }
        if let Some(index) = column(&headers, &technique.prediction_column()) {
            label_columns.push((technique, index));
        }
    }

    let text = |record: &StringRecord, index: Option<usize>| {
        index
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut unknown_labels = 0usize;
    for result in reader.records() {
        let record = result?;
        let Ok(date) = parse_leading_day(record.get(date_index).unwrap_or_default()) else {
            skipped += 1;
            continue;
        };

        let mut scores = PerTechnique::default();
        for (technique, index, name) in &score_columns {
            scores.set(*technique, parse_number(record.get(*index).unwrap_or_default(), name)?);
        }
        let mut labels = PerTechnique::default();
        for (technique, index) in &label_columns {
            let raw = record.get(*index).unwrap_or_default().trim();
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<SentimentLabel>() {
                Ok(label) => labels.set(*technique, Some(label)),
                Err(_) => unknown_labels += 1,
            }
        }

        records.push(SentimentRecord {
            date,
            country: text(&record, country_index),
            county: text(&record, county_index),
            county_id: text(&record, id_index),
            scores,
            labels,
        });
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Skipped rows with unreadable dates");
    }
    if unknown_labels > 0 {
        warn!(path = %path.display(), unknown_labels, "Ignored unrecognised sentiment labels");
    }
    Ok(records)
}

/// Reads the wide daily tweet count table: a `date` column plus one numeric
/// column per region.
pub fn read_tweet_counts(path: &Path) -> DashboardResult<Vec<TweetCountRow>> {
    let Some(mut reader) = open_reader(path)? else {
        return Ok(Vec::new());
    };
    let headers = reader.headers()?.clone();
    let date_index = required_column(&headers, "date")?;
    let regions: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != date_index && !name.is_empty() && !name.starts_with("Unnamed"))
        .map(|(i, name)| (i, name.to_string()))
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let date = parse_leading_day(record.get(date_index).unwrap_or_default())?;
        let mut volumes = BTreeMap::new();
        for (index, region) in &regions {
            let value = parse_number(record.get(*index).unwrap_or_default(), region)?;
            volumes.insert(region.clone(), value.unwrap_or(0.0));
        }
        rows.push(TweetCountRow { date, volumes });
    }
    Ok(rows)
}

/// Resolves the data directory the binary was pointed at.
pub fn resolve_data_dir(path: &Path) -> DashboardResult<PathBuf> {
    if path.is_dir() {
        Ok(path.to_path_buf())
    } else {
        Err(DashboardError::NotFound(format!(
            "data directory {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_tolerate_blanks_and_nan() {
        assert_eq!(parse_number("", "x").unwrap(), None);
        assert_eq!(parse_number("NaN", "x").unwrap(), None);
        assert_eq!(parse_number(" 1.5 ", "x").unwrap(), Some(1.5));
        assert!(parse_number("high", "x").is_err());
    }

    #[test]
    fn leading_day_ignores_time_of_day() {
        let date = parse_leading_day("2020-03-20 14:02:11").unwrap();
        assert_eq!(date.to_string(), "2020-03-20");
        assert!(parse_leading_day("yesterday").is_err());
    }

    #[test]
    fn missing_file_is_an_empty_table() {
        let rows = read_sentiment_records(Path::new("/nonexistent/all_tweet_sentiments.csv"))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn unrecognised_labels_are_dropped_but_rows_kept() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/odd_labels.csv");
        let rows = read_sentiment_records(&path).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(*rows[0].labels.get(Technique::Nn), Some(SentimentLabel::Pos));
        assert_eq!(*rows[0].labels.get(Technique::Vader), None);
        assert_eq!(*rows[0].scores.get(Technique::Vader), Some(0.2));
        assert_eq!(*rows[1].labels.get(Technique::Vader), None);
        assert_eq!(*rows[2].labels.get(Technique::Nn), Some(SentimentLabel::Neu));
        assert_eq!(*rows[2].labels.get(Technique::Vader), None);
    }

    #[test]
    fn empty_dataset_lists_four_countries() {
        let dataset = Dataset::empty(DashboardConfig::new("data"));
        assert_eq!(dataset.regions(RegionField::Country).len(), 4);
        assert!(dataset.regions(RegionField::County).is_empty());
        assert!(dataset.topic(Topic::Lockdown).sentiments.is_empty());
    }
}
