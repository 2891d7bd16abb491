//! One category's editing session: loader, draft and auto-save wired together.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::config::EngineConfig;
use super::loader::{LoadOutcome, ReconciliationLoader};
use super::scheduler::{AutoSaveScheduler, FlushReason, FlushSummary, SaveStatus};
use super::session::SharedSession;
use crate::cache::RecordCache;
use crate::draft::{Draft, DraftKey, Phase};
use crate::error::SaveError;
use crate::kv::MemoryKv;
use crate::models::{Category, SlotKey, Templates};
use crate::navigator::DateNavigator;
use crate::store::RecordStore;

pub struct LogEditor<S> {
    category: Category,
    session: SharedSession,
    templates: Arc<Templates>,
    loader: ReconciliationLoader<S>,
    scheduler: AutoSaveScheduler<S>,
}

impl<S> Clone for LogEditor<S> {
    fn clone(&self) -> Self {
        Self {
            category: self.category,
            session: self.session.clone(),
            templates: Arc::clone(&self.templates),
            loader: self.loader.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<S: RecordStore> LogEditor<S> {
    /// Editor with a session-local record cache.
    pub fn new(
        store: Arc<S>,
        category: Category,
        templates: Arc<Templates>,
        config: EngineConfig,
    ) -> Self {
        let cache = RecordCache::new(Arc::new(MemoryKv::new()));
        Self::with_cache(store, category, templates, config, cache)
    }

    pub fn with_cache(
        store: Arc<S>,
        category: Category,
        templates: Arc<Templates>,
        config: EngineConfig,
        cache: RecordCache,
    ) -> Self {
        let session = SharedSession::default();
        let loader = ReconciliationLoader::new(
            Arc::clone(&store),
            category,
            session.clone(),
            cache.clone(),
            Arc::clone(&templates),
            config.clone(),
        );
        let scheduler = AutoSaveScheduler::new(
            store,
            category,
            session.clone(),
            cache,
            Arc::clone(&templates),
            config,
        );
        Self {
            category,
            session,
            templates,
            loader,
            scheduler,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn scheduler(&self) -> &AutoSaveScheduler<S> {
        &self.scheduler
    }

    /// Switches to `date`, saving the outgoing draft in the background.
    ///
    /// Resolves as [`LoadOutcome::Stale`] when a later call supersedes it,
    /// including while it waits for the outgoing draft to be written.
    pub async fn activate(&self, date: NaiveDate) -> LoadOutcome {
        let ticket = self.session.lock().claim_activation();
        self.scheduler.retire_draft();
        // A retired draft of the same day must reach the store before it is reloaded.
        if let Err(e) = self.scheduler.settle(DraftKey::new(date, self.category)).await {
            tracing::warn!("Reloading {} with unsaved changes: {}", date, e);
        }
        let outcome = self.loader.activate_claimed(ticket, date).await;
        self.after_load(date, &outcome);
        outcome
    }

    /// Reloads after a failed load. No-op unless the draft is in the error phase.
    pub async fn retry(&self) -> LoadOutcome {
        let Some(date) = self.draft().map(|d| d.date()) else {
            return LoadOutcome::Stale;
        };
        let outcome = self.loader.retry().await;
        self.after_load(date, &outcome);
        outcome
    }

    fn after_load(&self, date: NaiveDate, outcome: &LoadOutcome) {
        if let LoadOutcome::Populated {
            pending_edits: true,
            ..
        } = outcome
        {
            self.scheduler.notify_mutated(date, self.category);
        }
    }

    /// Snapshot of the current draft.
    pub fn draft(&self) -> Option<Draft> {
        self.session.lock().draft.clone()
    }

    pub fn phase(&self) -> Phase {
        self.session
            .lock()
            .draft
            .as_ref()
            .map_or(Phase::Uninitialized, |d| d.phase().clone())
    }

    pub fn saving(&self) -> bool {
        self.scheduler.saving()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.scheduler.status()
    }

    pub fn set_set_completed(
        &self,
        slot: &SlotKey,
        exercise: &str,
        set: usize,
        completed: bool,
    ) -> bool {
        self.mutate(|d| d.set_set_completed(slot, exercise, set, completed))
    }

    pub fn set_exercise_weight(&self, slot: &SlotKey, exercise: &str, weight: f64) -> bool {
        self.mutate(|d| d.set_exercise_weight(slot, exercise, weight))
    }

    pub fn set_item_checked(&self, slot: &SlotKey, item: &str, checked: bool) -> bool {
        self.mutate(|d| d.set_item_checked(slot, item, checked))
    }

    pub fn set_item_amount(&self, slot: &SlotKey, item: &str, amount: f64) -> bool {
        self.mutate(|d| d.set_item_amount(slot, item, amount))
    }

    fn mutate(&self, apply: impl FnOnce(&mut Draft) -> bool) -> bool {
        let date = {
            let mut session = self.session.lock();
            let Some(draft) = session.draft.as_mut() else {
                return false;
            };
            if !apply(draft) {
                return false;
            }
            draft.date()
        };
        self.scheduler.notify_mutated(date, self.category);
        true
    }

    pub async fn force_flush(&self, reason: FlushReason) -> Result<FlushSummary, SaveError> {
        self.scheduler.force_flush(reason).await
    }

    /// Reconciles against every date the navigator moves to.
    ///
    /// An activation still running when the date changes again is dropped.
    /// Aborting the returned handle also cancels the activation in flight.
    pub fn follow(&self, navigator: &DateNavigator) -> JoinHandle<()> {
        let mut dates = navigator.subscribe();
        let editor = self.clone();
        tokio::spawn(async move {
            loop {
                let date = dates.borrow_and_update().date;
                let activation = editor.activate(date);
                tokio::pin!(activation);
                tokio::select! {
                    _ = &mut activation => {}
                    changed = dates.changed() => {
                        if changed.is_ok() {
                            continue;
                        }
                        // Navigator gone; finish the last requested date.
                        activation.await;
                        break;
                    }
                }
                if dates.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
