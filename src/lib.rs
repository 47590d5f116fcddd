//! Backend for the UK COVID-19 tweet sentiment dashboard.
//!
//! Source tables are loaded once into a [`Dataset`]; every view is recomputed
//! from it per request by the pure transforms in [`aggregate`] and [`smoothing`].

pub mod aggregate;
pub mod api;
pub mod config;
pub mod dataset;
pub mod dates;
pub mod error;
pub mod indicators;
pub mod models;
pub mod report;
pub mod smoothing;
pub mod table;
pub mod views;

pub use config::DashboardConfig;
pub use dataset::Dataset;
pub use error::{DashboardError, DashboardResult};
