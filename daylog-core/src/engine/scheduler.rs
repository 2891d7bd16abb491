//! Debounced, single-flight persistence of draft edits.

use chrono::NaiveDate;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use super::config::EngineConfig;
use super::session::SharedSession;
use crate::cache::RecordCache;
use crate::dedupe::dedupe;
use crate::draft::{DraftKey, SlotSnapshot};
use crate::error::{SaveError, StoreError};
use crate::models::{Category, LogRecord, NewLogRecord, Payload, RecordPatch, SlotKey, Templates};
use crate::normalize::{completed_flag, normalize};
use crate::store::{Filter, RecordStore};

/// Why a flush bypassed the debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Debounce,
    /// The user interface went to the background.
    Hidden,
    /// The process is about to exit.
    Unload,
    /// The active date changed away from an edited draft.
    Retired,
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlushReason::Debounce => "debounce",
            FlushReason::Hidden => "hidden",
            FlushReason::Unload => "unload",
            FlushReason::Retired => "retired",
        };
        f.write_str(name)
    }
}

/// Indicator state for the user. Purely informational.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Slots sent to the store.
    pub written: usize,
    /// Dirty slots whose payload matched the last persisted state.
    pub skipped: usize,
    /// Another flush for the key was running and will pick the changes up.
    pub queued: bool,
}

impl FlushSummary {
    fn absorb(&mut self, other: FlushSummary) {
        self.written += other.written;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Default)]
struct Flight {
    rerun: bool,
}

#[derive(Debug, Default)]
struct SchedulerState {
    flights: HashMap<DraftKey, Flight>,
    /// Unsaved slots of drafts that are no longer active.
    orphans: HashMap<DraftKey, BTreeMap<SlotKey, SlotSnapshot>>,
    /// Debounce generation per key; a timer only fires if it is still current.
    debounce: HashMap<DraftKey, u64>,
    status: SaveStatus,
    failed: Option<String>,
}

struct Job {
    key: DraftKey,
    snapshot: SlotSnapshot,
    epoch: u64,
    retired: bool,
}

struct Inner<S> {
    store: Arc<S>,
    category: Category,
    session: SharedSession,
    cache: RecordCache,
    templates: Arc<Templates>,
    config: EngineConfig,
    state: Mutex<SchedulerState>,
    idle: Notify,
}

pub struct AutoSaveScheduler<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for AutoSaveScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RecordStore> AutoSaveScheduler<S> {
    pub(crate) fn new(
        store: Arc<S>,
        category: Category,
        session: SharedSession,
        cache: RecordCache,
        templates: Arc<Templates>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                category,
                session,
                cache,
                templates,
                config,
                state: Mutex::new(SchedulerState::default()),
                idle: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> SaveStatus {
        self.state().status.clone()
    }

    /// True while any write is in flight.
    pub fn saving(&self) -> bool {
        !self.state().flights.is_empty()
    }

    /// Schedules a save of the draft for `date` after the debounce window.
    ///
    /// Returns false, doing nothing, unless that draft is being edited.
    pub fn notify_mutated(&self, date: NaiveDate, category: Category) -> bool {
        let key = DraftKey::new(date, category);
        if category != self.inner.category
            || self.inner.session.lock().editing_draft(key).is_none()
        {
            return false;
        }
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("No runtime to schedule a save of {}", key);
            return false;
        };

        let generation = {
            let mut state = self.state();
            let generation = state.debounce.entry(key).or_default();
            *generation += 1;
            *generation
        };

        let scheduler = self.clone();
        let debounce = self.inner.config.debounce();
        handle.spawn(async move {
            tokio::time::sleep(debounce).await;
            if scheduler.state().debounce.get(&key) != Some(&generation) {
                return;
            }
            // Failures are logged by flush and retried by the next edit.
            let _ = scheduler.flush(key).await;
        });
        true
    }

    /// Writes every pending slot right away, waiting for in-flight writes.
    pub async fn force_flush(&self, reason: FlushReason) -> Result<FlushSummary, SaveError> {
        let mut keys: Vec<DraftKey> = {
            let mut state = self.state();
            for generation in state.debounce.values_mut() {
                *generation += 1;
            }
            state
                .orphans
                .keys()
                .chain(state.flights.keys())
                .copied()
                .collect()
        };
        if let Some(key) = self.inner.session.lock().editing_key() {
            keys.push(key);
        }
        keys.sort();
        keys.dedup();
        tracing::debug!("Forced flush ({}) of {} draft(s)", reason, keys.len());

        // Keys are independent; only writes within one key are serialized.
        let results = join_all(keys.into_iter().map(|key| self.flush_when_idle(key))).await;
        let mut total = FlushSummary::default();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(summary) => total.absorb(summary),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    /// Hands the unsaved slots of the outgoing draft to a background flush.
    ///
    /// Called before the active date changes; the new draft then replaces the
    /// old one without losing its edits.
    pub fn retire_draft(&self) -> bool {
        let (key, snapshots) = {
            let session = self.inner.session.lock();
            let Some(draft) = session.draft.as_ref() else {
                return false;
            };
            let key = draft.key();
            if session.editing_key() != Some(key) {
                if draft.has_dirty() {
                    tracing::warn!(
                        "Dropping unsaved edits of {} made before it finished loading",
                        key
                    );
                }
                return false;
            }
            let snapshots: Vec<SlotSnapshot> = draft
                .dirty_slots()
                .into_iter()
                .filter(|s| s.changed)
                .collect();
            (key, snapshots)
        };
        if snapshots.is_empty() {
            return false;
        }

        {
            let mut state = self.state();
            if let Some(generation) = state.debounce.get_mut(&key) {
                *generation += 1;
            }
            let orphans = state.orphans.entry(key).or_default();
            for snapshot in snapshots {
                orphans.insert(snapshot.slot.clone(), snapshot);
            }
        }
        tracing::info!("Saving edits of {} in the background", key);

        match Handle::try_current() {
            Ok(handle) => {
                let scheduler = self.clone();
                handle.spawn(async move {
                    let _ = scheduler.flush_when_idle(key).await;
                });
            }
            Err(_) => tracing::warn!("No runtime to save retired draft {}", key),
        }
        true
    }

    /// Waits until nothing for `key` is queued or in flight.
    pub async fn settle(&self, key: DraftKey) -> Result<(), SaveError> {
        let pending = {
            let state = self.state();
            state.orphans.contains_key(&key) || state.flights.contains_key(&key)
        };
        if pending {
            self.flush_when_idle(key).await?;
        }
        Ok(())
    }

    async fn flush_when_idle(&self, key: DraftKey) -> Result<FlushSummary, SaveError> {
        loop {
            let idle = self.inner.idle.notified();
            let busy = self.state().flights.contains_key(&key);
            if !busy {
                let summary = self.flush(key).await?;
                if !summary.queued {
                    return Ok(summary);
                }
            }
            idle.await;
        }
    }

    /// Persists the pending slots of `key`.
    ///
    /// If a flush of the same key is already running, it is asked to run once
    /// more with the freshest state and this call returns with `queued` set.
    pub async fn flush(&self, key: DraftKey) -> Result<FlushSummary, SaveError> {
        {
            let mut state = self.state();
            if let Some(flight) = state.flights.get_mut(&key) {
                flight.rerun = true;
                return Ok(FlushSummary {
                    queued: true,
                    ..FlushSummary::default()
                });
            }
            state.flights.insert(key, Flight::default());
            state.status = SaveStatus::Saving;
        }

        let mut summary = FlushSummary::default();
        let mut first_error: Option<SaveError> = None;
        loop {
            for job in self.collect_jobs(key) {
                match self.persist(&job).await {
                    Ok(Some(record)) => {
                        summary.written += 1;
                        self.finish(&job, Some(record));
                    }
                    Ok(None) => {
                        summary.skipped += 1;
                        self.finish(&job, None);
                    }
                    Err(e) => {
                        tracing::warn!("{}", e);
                        if job.retired {
                            self.requeue(job);
                        }
                        first_error.get_or_insert(e);
                    }
                }
            }

            let mut state = self.state();
            let rerun = state
                .flights
                .get_mut(&key)
                .is_some_and(|f| std::mem::take(&mut f.rerun));
            if rerun {
                continue;
            }
            state.flights.remove(&key);
            if let Some(e) = &first_error {
                state.failed = Some(e.to_string());
            }
            if state.flights.is_empty() {
                state.status = match state.failed.take() {
                    Some(message) => SaveStatus::Failed(message),
                    None => SaveStatus::Saved,
                };
            }
            break;
        }
        self.inner.idle.notify_waiters();

        if summary.written > 0 {
            tracing::info!("Saved {} slot(s) of {}", summary.written, key);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Snapshots taken now, so a queued rerun always sends the latest state.
    fn collect_jobs(&self, key: DraftKey) -> Vec<Job> {
        let orphans = self.state().orphans.remove(&key).unwrap_or_default();
        let (epoch, live) = {
            let session = self.inner.session.lock();
            let live = session
                .editing_draft(key)
                .map(|d| d.dirty_slots())
                .unwrap_or_default();
            (session.epoch, live)
        };

        let mut jobs: BTreeMap<SlotKey, Job> = orphans
            .into_iter()
            .map(|(slot, snapshot)| {
                let job = Job {
                    key,
                    snapshot,
                    epoch,
                    retired: true,
                };
                (slot, job)
            })
            .collect();
        for snapshot in live {
            let job = Job {
                key,
                snapshot,
                epoch,
                retired: false,
            };
            jobs.insert(job.snapshot.slot.clone(), job);
        }
        jobs.into_values().collect()
    }

    /// `Ok(None)` when the slot had nothing new to write.
    async fn persist(&self, job: &Job) -> Result<Option<LogRecord>, SaveError> {
        let snapshot = &job.snapshot;
        let slot = &snapshot.slot;
        if !snapshot.changed {
            tracing::debug!("Skipping unchanged {} of {}", slot, job.key);
            return Ok(None);
        }
        let save_error = |source: StoreError| SaveError {
            date: job.key.date,
            slot: slot.clone(),
            source,
        };

        let payload = normalize(&self.inner.templates, slot, &snapshot.payload);
        let completed = completed_flag(&self.inner.templates, slot, &payload);

        let existing = match &snapshot.record_id {
            Some(id) => Some(id.clone()),
            None => self.lookup(job.key, slot).await.map_err(save_error)?,
        };

        let record = match existing {
            Some(id) => {
                let patch = RecordPatch {
                    payload: payload.clone(),
                    completed,
                };
                match self.inner.store.update(self.inner.category, &id, patch).await {
                    Err(StoreError::NotFound(_)) => {
                        tracing::warn!("Record {} disappeared, recreating {}", id, slot);
                        self.create(job.key.date, slot, payload, completed).await
                    }
                    result => result,
                }
            }
            None => self.create(job.key.date, slot, payload, completed).await,
        };
        record.map(Some).map_err(save_error)
    }

    async fn create(
        &self,
        date: NaiveDate,
        slot: &SlotKey,
        payload: Payload,
        completed: Option<bool>,
    ) -> Result<LogRecord, StoreError> {
        let record = NewLogRecord::new(date, slot, payload).with_completed(completed);
        self.inner.store.create(self.inner.category, record).await
    }

    /// Id of the authoritative record already stored for `slot`, if any.
    async fn lookup(&self, key: DraftKey, slot: &SlotKey) -> Result<Option<String>, StoreError> {
        let records = self
            .inner
            .store
            .filter(self.inner.category, &Filter::new().date(key.date))
            .await?;
        Ok(dedupe(records)
            .into_iter()
            .find(|r| r.slot_key().as_ref() == Ok(slot))
            .map(|r| r.id))
    }

    fn finish(&self, job: &Job, record: Option<LogRecord>) {
        let snapshot = &job.snapshot;
        if !job.retired {
            let mut session = self.inner.session.lock();
            if session.epoch == job.epoch {
                if let Some(draft) = session.draft_mut(job.key) {
                    let persisted = match &record {
                        Some(r) => normalize(&self.inner.templates, &snapshot.slot, &r.payload),
                        None => snapshot.payload.clone(),
                    };
                    draft.acknowledge(
                        &snapshot.slot,
                        snapshot.revision,
                        record.as_ref().map(|r| r.id.clone()),
                        persisted,
                    );
                }
            }
        }
        if let Some(record) = record {
            if let Err(e) = self.inner.cache.upsert(&job.key, record) {
                tracing::warn!("Failed to cache saved record for {}: {}", job.key, e);
            }
        }
    }

    fn requeue(&self, job: Job) {
        let mut state = self.state();
        state
            .orphans
            .entry(job.key)
            .or_default()
            .entry(job.snapshot.slot.clone())
            .or_insert(job.snapshot);
    }
}
