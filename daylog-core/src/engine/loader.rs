//! Fetches a day's authoritative records and populates a fresh draft.

use chrono::{Days, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;

use super::config::EngineConfig;
use super::session::SharedSession;
use crate::cache::RecordCache;
use crate::dedupe::dedupe;
use crate::draft::{Draft, DraftKey, Phase};
use crate::error::{LoadError, StoreError};
use crate::models::{Category, LogRecord, SlotKey, Templates, WorkoutType};
use crate::normalize::{weight_seed, WeightSeed};
use crate::store::{Filter, RecordStore};

/// How an activation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The draft is populated and editable.
    Populated {
        restored: usize,
        /// Edits made while loading are waiting to be saved.
        pending_edits: bool,
    },
    /// Another activation superseded this one; its result was dropped.
    Stale,
    Failed(LoadError),
}

struct Fetched {
    records: Vec<LogRecord>,
    seeds: HashMap<WorkoutType, WeightSeed>,
}

pub struct ReconciliationLoader<S> {
    store: Arc<S>,
    category: Category,
    session: SharedSession,
    cache: RecordCache,
    templates: Arc<Templates>,
    config: EngineConfig,
}

impl<S> Clone for ReconciliationLoader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            category: self.category,
            session: self.session.clone(),
            cache: self.cache.clone(),
            templates: Arc::clone(&self.templates),
            config: self.config.clone(),
        }
    }
}

impl<S: RecordStore> ReconciliationLoader<S> {
    pub(crate) fn new(
        store: Arc<S>,
        category: Category,
        session: SharedSession,
        cache: RecordCache,
        templates: Arc<Templates>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            category,
            session,
            cache,
            templates,
            config,
        }
    }

    /// Replaces the draft with a fresh one for `date` and loads it.
    ///
    /// Resolves once the guard window has passed and the draft accepts edits.
    pub async fn activate(&self, date: NaiveDate) -> LoadOutcome {
        let ticket = self.session.lock().claim_activation();
        self.activate_claimed(ticket, date).await
    }

    /// Like [`activate`](Self::activate) for a ticket claimed earlier.
    ///
    /// Resolves as stale without touching the draft if a newer activation
    /// was requested since.
    pub(crate) async fn activate_claimed(&self, ticket: u64, date: NaiveDate) -> LoadOutcome {
        let epoch = {
            let mut session = self.session.lock();
            if session.activations != ticket {
                tracing::debug!("Skipping superseded activation of {} {}", self.category, date);
                return LoadOutcome::Stale;
            }
            session.epoch += 1;
            let mut draft = Draft::new(date, self.category, &self.templates);
            draft.begin_loading();
            session.draft = Some(draft);
            session.epoch
        };
        tracing::debug!("Activating {} {}", self.category, date);
        self.run(epoch, DraftKey::new(date, self.category)).await
    }

    /// Reloads a draft that is in the error phase, keeping its local edits.
    pub async fn retry(&self) -> LoadOutcome {
        let (epoch, key) = {
            let mut session = self.session.lock();
            let next = session.epoch + 1;
            let Some(draft) = session.draft.as_mut() else {
                return LoadOutcome::Stale;
            };
            if !matches!(draft.phase(), Phase::Error(_)) {
                return LoadOutcome::Stale;
            }
            draft.begin_loading();
            let key = draft.key();
            session.epoch = next;
            (next, key)
        };
        tracing::info!("Retrying load of {}", key);
        self.run(epoch, key).await
    }

    async fn run(&self, epoch: u64, key: DraftKey) -> LoadOutcome {
        let fetched = match self.fetch_with_retry(epoch, key).await {
            Ok(Some(fetched)) => fetched,
            Ok(None) => return LoadOutcome::Stale,
            Err(error) => {
                let mut session = self.session.lock();
                if !session.is_current(epoch, key) {
                    return LoadOutcome::Stale;
                }
                tracing::error!("{}", error);
                if let Some(draft) = session.draft_mut(key) {
                    draft.fail(error.clone());
                }
                return LoadOutcome::Failed(error);
            }
        };

        let restored = {
            let mut session = self.session.lock();
            if !session.is_current(epoch, key) {
                tracing::debug!("Discarding stale load of {}", key);
                return LoadOutcome::Stale;
            }
            let Some(draft) = session.draft_mut(key) else {
                return LoadOutcome::Stale;
            };
            let summary = draft.populate(fetched.records, &self.templates, &fetched.seeds);
            if summary.kept_local > 0 {
                tracing::info!(
                    "Kept local edits over fetched data for {} slot(s) of {}",
                    summary.kept_local,
                    key
                );
            }
            summary.restored
        };

        tokio::time::sleep(self.config.guard()).await;

        let mut session = self.session.lock();
        if !session.is_current(epoch, key) {
            return LoadOutcome::Stale;
        }
        let Some(draft) = session.draft_mut(key) else {
            return LoadOutcome::Stale;
        };
        if !draft.start_editing() {
            return LoadOutcome::Stale;
        }
        LoadOutcome::Populated {
            restored,
            pending_edits: draft.has_dirty(),
        }
    }

    /// `Ok(None)` when the activation was superseded while backing off.
    async fn fetch_with_retry(
        &self,
        epoch: u64,
        key: DraftKey,
    ) -> Result<Option<Fetched>, LoadError> {
        let policy = &self.config.retry;
        let mut retries = 0;
        loop {
            match self.fetch(key).await {
                Ok(fetched) => return Ok(Some(fetched)),
                Err(source) if retries >= policy.max_retries => {
                    return Err(LoadError {
                        date: key.date,
                        category: key.category,
                        attempts: retries + 1,
                        source,
                    });
                }
                Err(e) => {
                    let delay = policy.delay(retries);
                    tracing::warn!("Loading {} failed ({}), retrying in {:?}", key, e, delay);
                    tokio::time::sleep(delay).await;
                    retries += 1;
                    if !self.session.lock().is_current(epoch, key) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn fetch(&self, key: DraftKey) -> Result<Fetched, StoreError> {
        let records = match self.cache.get(&key) {
            Some(records) => {
                tracing::debug!("Using cached records for {}", key);
                records
            }
            None => {
                let raw = self
                    .store
                    .filter(self.category, &Filter::new().date(key.date))
                    .await?;
                for record in &raw {
                    record.validate()?;
                }
                let records = dedupe(raw);
                if let Err(e) = self.cache.put(&key, &records) {
                    tracing::warn!("Failed to cache records for {}: {}", key, e);
                }
                records
            }
        };
        tracing::info!("Loaded {} record(s) for {}", records.len(), key);

        let seeds = match self.category {
            Category::Workout => self.fetch_seeds(key.date).await?,
            Category::Nutrition => HashMap::new(),
        };
        Ok(Fetched { records, seeds })
    }

    /// Working weights from the most recent earlier session of each workout type.
    async fn fetch_seeds(
        &self,
        date: NaiveDate,
    ) -> Result<HashMap<WorkoutType, WeightSeed>, StoreError> {
        let lookback = u64::from(self.config.seed_lookback_days);
        let (Some(from), Some(to)) = (date.checked_sub_days(Days::new(lookback)), date.pred_opt())
        else {
            return Ok(HashMap::new());
        };

        let records = self
            .store
            .query(self.category)
            .range_by_date(from, to)
            .exec()
            .await?;

        let mut latest: HashMap<WorkoutType, &LogRecord> = HashMap::new();
        for record in records.iter().filter(|r| r.date < date) {
            let Ok(SlotKey::Workout(workout_type)) = record.slot_key() else {
                continue;
            };
            let newer = latest.get(&workout_type).map_or(true, |current| {
                (record.date, record.recency()) > (current.date, current.recency())
            });
            if newer {
                latest.insert(workout_type, record);
            }
        }

        Ok(latest
            .into_iter()
            .filter_map(|(t, r)| r.payload.as_workout().map(|w| (t, weight_seed(w))))
            .collect())
    }
}
