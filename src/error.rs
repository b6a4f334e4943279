use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures raised by a [`crate::store::RecordStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid stored timestamp: {0}")]
    Timestamp(i64),

    #[error("record store lock poisoned")]
    Poisoned,
}

/// Error classification returned by the report operations.
///
/// Callers can tell "no data" (an empty result) apart from these.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid window: end {end} is before start {start}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("record store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("query cancelled before completion")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
