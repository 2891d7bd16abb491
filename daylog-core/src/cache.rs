//! Session mirror of authoritative records, for read-after-write consistency.
//!
//! Successful loads and saves are written here so a later load of the same
//! day sees the session's own writes without asking the store.

use std::sync::Arc;

use crate::dedupe::dedupe;
use crate::draft::DraftKey;
use crate::error::KvError;
use crate::kv::KeyValueStore;
use crate::models::LogRecord;

#[derive(Clone)]
pub struct RecordCache {
    kv: Arc<dyn KeyValueStore>,
}

impl RecordCache {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn cache_key(key: &DraftKey) -> String {
        format!("records:{}:{}", key.category, key.date)
    }

    /// Cached authoritative records, or `None` when the day was never loaded.
    ///
    /// Unreadable entries count as a miss.
    pub fn get(&self, key: &DraftKey) -> Option<Vec<LogRecord>> {
        let raw = match self.kv.get(&Self::cache_key(key)) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Record cache read failed for {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Some(records),
            Err(e) => {
                tracing::warn!("Discarding unreadable cache entry for {}: {}", key, e);
                None
            }
        }
    }

    pub fn put(&self, key: &DraftKey, records: &[LogRecord]) -> Result<(), KvError> {
        let cache_key = Self::cache_key(key);
        let value = serde_json::to_string(records).map_err(|source| KvError::Encode {
            key: cache_key.clone(),
            source,
        })?;
        self.kv.set(&cache_key, value)
    }

    /// Replaces the cached record of the written record's slot.
    ///
    /// Days that were never loaded stay uncached, so a later load still goes
    /// to the store for the other slots.
    pub fn upsert(&self, key: &DraftKey, record: LogRecord) -> Result<(), KvError> {
        let Some(mut records) = self.get(key) else {
            return Ok(());
        };
        records.retain(|r| r.id != record.id);
        records.push(record);
        let records = dedupe(records);
        self.put(key, &records)
    }

    pub fn invalidate(&self, key: &DraftKey) -> Result<(), KvError> {
        self.kv.remove(&Self::cache_key(key))
    }
}
