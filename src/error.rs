use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Metric;

/// Errors raised by the store, the command layer and the weekly pipeline.
#[derive(Error, Debug)]
pub enum HealthError {
    #[error("No health records to process")]
    EmptyDataset,

    #[error("Missing record for date: {0}")]
    MissingDate(NaiveDate),

    #[error("{metric} out of range on {date}: {value}")]
    RangeViolation {
        metric: Metric,
        date: NaiveDate,
        value: i32,
    },

    #[error("A record already exists for date: {0}")]
    DuplicateDate(NaiveDate),

    #[error("Not found date: {0}")]
    NotFound(NaiveDate),

    #[error("Invalid date format: {0}. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HealthError>;

impl HealthError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn chart(msg: impl Into<String>) -> Self {
        Self::Chart(msg.into())
    }

    /// Errors the command layer reports to the user instead of failing the process.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::DuplicateDate(_))
    }
}
