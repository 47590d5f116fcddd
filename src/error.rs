//! Error types for the dashboard pipeline.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

/// Pipeline result type.
pub type DashboardResult<T> = Result<T, DashboardError>;

/// Errors raised while loading or transforming dashboard data.
#[derive(Debug, Error)]
pub enum DashboardError {
    // === Data mismatches ===
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Date outside supported months: {0}")]
    DateOutOfRange(NaiveDate),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid number in column {column}: {value:?}")]
    InvalidNumber { column: String, value: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unexpected cell in column {column}: {value}")]
    InvalidCell { column: String, value: String },

    // === Source errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DashboardError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDate(_) | Self::DateOutOfRange(_) | Self::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MissingColumn(_)
            | Self::UnknownRegion(_)
            | Self::InvalidNumber { .. }
            | Self::InvalidCell { .. }
            | Self::Io(_)
            | Self::Csv(_)
            | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingColumn(_) => "MISSING_COLUMN",
            Self::UnknownRegion(_) => "UNKNOWN_REGION",
            Self::DateOutOfRange(_) => "DATE_OUT_OF_RANGE",
            Self::InvalidDate(_) => "INVALID_DATE",
            Self::InvalidNumber { .. } => "INVALID_NUMBER",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::InvalidCell { .. } => "INVALID_CELL",
            Self::Io(_) => "IO_ERROR",
            Self::Csv(_) => "CSV_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Pipeline failed");
        } else {
            tracing::debug!(error = %self, code = code, "Rejected request");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
