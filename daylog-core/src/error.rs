//! Error types shared across the engine.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{Category, SlotKey};

/// Failures reported by a [`RecordStore`](crate::store::RecordStore).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Transport(String),

    #[error("Store returned status {0}")]
    Status(u16),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Malformed record data: {0}")]
    Malformed(String),

    #[error("Unsupported filter field: {0}")]
    InvalidFilter(String),
}

/// A record whose slot columns cannot be resolved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Record {id} has no workout type")]
    MissingWorkoutType { id: String },

    #[error("Record {id} has no meal number")]
    MissingMealNumber { id: String },

    #[error("Record {id} is a {category} record but carries a {payload} payload")]
    PayloadMismatch {
        id: String,
        category: Category,
        payload: Category,
    },
}

impl From<RecordError> for StoreError {
    fn from(e: RecordError) -> Self {
        StoreError::Malformed(e.to_string())
    }
}

/// Loading a day's log failed after all retries.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to load {category} log for {date} after {attempts} attempt(s): {source}")]
pub struct LoadError {
    pub date: NaiveDate,
    pub category: Category,
    pub attempts: u32,
    #[source]
    pub source: StoreError,
}

/// Persisting one slot failed. Never retried by the scheduler itself.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to save {slot} for {date}: {source}")]
pub struct SaveError {
    pub date: NaiveDate,
    pub slot: SlotKey,
    #[source]
    pub source: StoreError,
}

/// Failures of the injected key-value store.
#[derive(Error, Debug)]
pub enum KvError {
    #[error("Key-value store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to encode value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display() {
        let err = LoadError {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            category: Category::Workout,
            attempts: 4,
            source: StoreError::Status(503),
        };
        let msg = err.to_string();
        assert!(msg.contains("workout log for 2024-05-01"));
        assert!(msg.contains("4 attempt(s)"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_record_error_becomes_malformed() {
        let err: StoreError = RecordError::MissingMealNumber {
            id: "r1".to_string(),
        }
        .into();
        assert!(matches!(err, StoreError::Malformed(ref m) if m.contains("r1")));
    }
}
