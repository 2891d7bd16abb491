//! The remote record store the engine reads from and writes to.
//!
//! The store is an external collaborator: last write wins, no client-side
//! locking, and possibly more than one record per slot. Readers resolve
//! duplicates with [`dedupe`](crate::dedupe::dedupe).

mod http;
mod memory;
#[cfg(test)]
pub(crate) mod testing;

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;

use crate::error::StoreError;
use crate::models::{Category, LogRecord, NewLogRecord, RecordPatch};

pub use http::HttpStore;
pub use memory::{MemoryStore, StoreStats};

/// Equality conditions on top-level record fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: BTreeMap<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn date(self, date: NaiveDate) -> Self {
        self.eq("date", date.to_string())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Matches against the record's JSON form. Absent fields only match `null`.
    pub fn matches(&self, record: &LogRecord) -> bool {
        let Ok(Value::Object(json)) = serde_json::to_value(record) else {
            return false;
        };
        self.fields
            .iter()
            .all(|(field, expected)| json.get(field).unwrap_or(&Value::Null) == expected)
    }
}

/// Record store addressed by category.
pub trait RecordStore: Send + Sync + 'static {
    fn create(
        &self,
        category: Category,
        record: NewLogRecord,
    ) -> impl Future<Output = Result<LogRecord, StoreError>> + Send;

    fn update(
        &self,
        category: Category,
        id: &str,
        patch: RecordPatch,
    ) -> impl Future<Output = Result<LogRecord, StoreError>> + Send;

    fn filter(
        &self,
        category: Category,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<LogRecord>, StoreError>> + Send;

    /// Records dated within `from..=to`.
    fn range_by_date(
        &self,
        category: Category,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<LogRecord>, StoreError>> + Send;

    fn delete(
        &self,
        category: Category,
        id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Starts a query builder: `store.query(c).range_by_date(from, to).exec()`.
    fn query(&self, category: Category) -> Query<'_, Self>
    where
        Self: Sized,
    {
        Query {
            store: self,
            category,
        }
    }
}

pub struct Query<'a, S> {
    store: &'a S,
    category: Category,
}

impl<'a, S: RecordStore> Query<'a, S> {
    pub fn range_by_date(self, from: NaiveDate, to: NaiveDate) -> RangeQuery<'a, S> {
        RangeQuery {
            store: self.store,
            category: self.category,
            from,
            to,
        }
    }
}

pub struct RangeQuery<'a, S> {
    store: &'a S,
    category: Category,
    from: NaiveDate,
    to: NaiveDate,
}

impl<S: RecordStore> RangeQuery<'_, S> {
    pub async fn exec(self) -> Result<Vec<LogRecord>, StoreError> {
        if self.from > self.to {
            return Ok(Vec::new());
        }
        self.store
            .range_by_date(self.category, self.from, self.to)
            .await
    }
}
