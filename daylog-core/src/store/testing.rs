//! Store wrappers that let tests hold, fail and observe store calls.

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use super::{Filter, MemoryStore, RecordStore};
use crate::error::StoreError;
use crate::models::{Category, LogRecord, NewLogRecord, RecordPatch};

#[derive(Default)]
struct Gates {
    held_dates: HashSet<String>,
    hold_writes: bool,
    waiting: usize,
    read_failures: u32,
    write_failures: u32,
    active_writes: usize,
    max_active_writes: usize,
}

#[derive(Default)]
pub(crate) struct GatedStore {
    inner: MemoryStore,
    gates: Mutex<Gates>,
    released: Notify,
}

impl GatedStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn gates(&self) -> MutexGuard<'_, Gates> {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Filters on `date` block until [`release_date`](Self::release_date).
    pub(crate) fn hold_date(&self, date: NaiveDate) {
        self.gates().held_dates.insert(date.to_string());
    }

    pub(crate) fn release_date(&self, date: NaiveDate) {
        self.gates().held_dates.remove(&date.to_string());
        self.released.notify_waiters();
    }

    pub(crate) fn hold_writes(&self) {
        self.gates().hold_writes = true;
    }

    pub(crate) fn release_writes(&self) {
        self.gates().hold_writes = false;
        self.released.notify_waiters();
    }

    /// Calls currently blocked on a gate.
    pub(crate) fn waiting(&self) -> usize {
        self.gates().waiting
    }

    pub(crate) fn fail_reads(&self, count: u32) {
        self.gates().read_failures = count;
    }

    pub(crate) fn fail_writes(&self, count: u32) {
        self.gates().write_failures = count;
    }

    pub(crate) fn max_concurrent_writes(&self) -> usize {
        self.gates().max_active_writes
    }

    async fn wait_while(&self, held: impl Fn(&Gates) -> bool) {
        let mut counted = false;
        loop {
            let released = self.released.notified();
            {
                let mut gates = self.gates();
                if !held(&gates) {
                    if counted {
                        gates.waiting -= 1;
                    }
                    return;
                }
                if !counted {
                    gates.waiting += 1;
                    counted = true;
                }
            }
            released.await;
        }
    }

    fn take_read_failure(&self) -> Result<(), StoreError> {
        let mut gates = self.gates();
        if gates.read_failures > 0 {
            gates.read_failures -= 1;
            return Err(StoreError::Transport("injected read failure".to_string()));
        }
        Ok(())
    }

    async fn begin_write(&self) -> Result<(), StoreError> {
        {
            let mut gates = self.gates();
            gates.active_writes += 1;
            gates.max_active_writes = gates.max_active_writes.max(gates.active_writes);
        }
        self.wait_while(|g| g.hold_writes).await;
        let mut gates = self.gates();
        if gates.write_failures > 0 {
            gates.write_failures -= 1;
            gates.active_writes -= 1;
            return Err(StoreError::Status(503));
        }
        Ok(())
    }

    fn end_write(&self) {
        self.gates().active_writes -= 1;
    }
}

impl RecordStore for GatedStore {
    async fn create(
        &self,
        category: Category,
        record: NewLogRecord,
    ) -> Result<LogRecord, StoreError> {
        self.begin_write().await?;
        let result = self.inner.create(category, record).await;
        self.end_write();
        result
    }

    async fn update(
        &self,
        category: Category,
        id: &str,
        patch: RecordPatch,
    ) -> Result<LogRecord, StoreError> {
        self.begin_write().await?;
        let result = self.inner.update(category, id, patch).await;
        self.end_write();
        result
    }

    async fn filter(
        &self,
        category: Category,
        filter: &Filter,
    ) -> Result<Vec<LogRecord>, StoreError> {
        if let Some(Value::String(date)) = filter.get("date") {
            let date = date.clone();
            self.wait_while(move |g| g.held_dates.contains(&date)).await;
        }
        self.take_read_failure()?;
        self.inner.filter(category, filter).await
    }

    async fn range_by_date(
        &self,
        category: Category,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LogRecord>, StoreError> {
        self.take_read_failure()?;
        self.inner.range_by_date(category, from, to).await
    }

    async fn delete(&self, category: Category, id: &str) -> Result<(), StoreError> {
        self.inner.delete(category, id).await
    }
}
