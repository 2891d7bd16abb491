use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::draft::{Draft, DraftKey, Phase};

/// State shared by the loader, the scheduler and the editor of one category.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) draft: Option<Draft>,
    /// Bumped on every activation and retry; loads compare against it to
    /// detect that they were superseded.
    pub(crate) epoch: u64,
    /// Ticket of the most recently requested activation. Claimed before any
    /// await so a later request always outranks an earlier one.
    pub(crate) activations: u64,
}

impl Session {
    pub(crate) fn claim_activation(&mut self) -> u64 {
        self.activations += 1;
        self.activations
    }

    pub(crate) fn draft_mut(&mut self, key: DraftKey) -> Option<&mut Draft> {
        self.draft.as_mut().filter(|d| d.key() == key)
    }

    pub(crate) fn is_current(&self, epoch: u64, key: DraftKey) -> bool {
        self.epoch == epoch && self.draft.as_ref().is_some_and(|d| d.key() == key)
    }

    pub(crate) fn editing_draft(&self, key: DraftKey) -> Option<&Draft> {
        self.draft
            .as_ref()
            .filter(|d| d.key() == key && *d.phase() == Phase::Editing)
    }

    pub(crate) fn editing_key(&self) -> Option<DraftKey> {
        self.draft
            .as_ref()
            .filter(|d| *d.phase() == Phase::Editing)
            .map(Draft::key)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SharedSession(Arc<Mutex<Session>>);

impl SharedSession {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
