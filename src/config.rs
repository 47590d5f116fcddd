//! Runtime settings shared by the loader and every pipeline.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::dates::{canonical_date_range, DateRange};
use crate::smoothing::MA_WINDOW;

/// Where the data lives and which window of it the dashboard shows.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub data_dir: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub window: usize,
}

impl DashboardConfig {
    /// Defaults to the dataset's full span, 2020-03-20 to 2021-03-25, with a 7-day MA.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            start: NaiveDate::from_ymd_opt(2020, 3, 20).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2021, 3, 25).unwrap_or_default(),
            window: MA_WINDOW,
        }
    }

    pub fn dates(&self) -> DateRange {
        canonical_date_range(self.start, self.end)
    }

    /// Clamps a requested end date into the configured window.
    pub fn clamp(&self, date: NaiveDate) -> NaiveDate {
        date.clamp(self.start, self.end)
    }
}
