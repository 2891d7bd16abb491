//! In-memory mirror of the day's log the user is editing.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::LoadError;
use crate::models::{Category, LogRecord, Payload, SlotKey, Templates, WorkoutType};
use crate::normalize::{self, WeightSeed};

/// Identifies the draft of one editor: a day and a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DraftKey {
    pub date: NaiveDate,
    pub category: Category,
}

impl DraftKey {
    pub fn new(date: NaiveDate, category: Category) -> Self {
        Self { date, category }
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.category, self.date)
    }
}

/// Reconciliation phase of a draft.
///
/// `Uninitialized -> Loading -> Populated -> Editing`, with `Loading -> Error`
/// when the store cannot be reached and `Error -> Loading` on retry.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Uninitialized,
    Loading,
    /// Freshly populated; changes are absorbed without counting as edits.
    Populated,
    Editing,
    Error(LoadError),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Loading => "loading",
            Phase::Populated => "populated",
            Phase::Editing => "editing",
            Phase::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotState {
    pub payload: Payload,
    /// Last loaded or persisted payload.
    pub baseline: Payload,
    pub record_id: Option<String>,
    pub dirty: bool,
    pub revision: u64,
}

impl SlotState {
    fn new(payload: Payload, record_id: Option<String>) -> Self {
        Self {
            baseline: payload.clone(),
            payload,
            record_id,
            dirty: false,
            revision: 0,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.payload != self.baseline
    }
}

/// What the scheduler needs to persist one dirty slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSnapshot {
    pub slot: SlotKey,
    pub payload: Payload,
    pub record_id: Option<String>,
    pub revision: u64,
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub restored: usize,
    /// Slots whose local edits won over the fetched record.
    pub kept_local: usize,
}

#[derive(Debug, Clone)]
pub struct Draft {
    key: DraftKey,
    phase: Phase,
    slots: BTreeMap<SlotKey, SlotState>,
}

impl Draft {
    /// A draft holding the template default of every slot.
    pub fn new(date: NaiveDate, category: Category, templates: &Templates) -> Self {
        let slots = templates
            .slots(category)
            .into_iter()
            .map(|slot| {
                let payload = normalize::default_payload(templates, &slot, None);
                (slot, SlotState::new(payload, None))
            })
            .collect();
        Self {
            key: DraftKey::new(date, category),
            phase: Phase::Uninitialized,
            slots,
        }
    }

    pub fn key(&self) -> DraftKey {
        self.key
    }

    pub fn date(&self) -> NaiveDate {
        self.key.date
    }

    pub fn category(&self) -> Category {
        self.key.category
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn slots(&self) -> &BTreeMap<SlotKey, SlotState> {
        &self.slots
    }

    pub fn slot(&self, slot: &SlotKey) -> Option<&SlotState> {
        self.slots.get(slot)
    }

    pub fn has_dirty(&self) -> bool {
        self.slots.values().any(|s| s.dirty)
    }

    pub fn begin_loading(&mut self) {
        self.phase = Phase::Loading;
    }

    pub fn fail(&mut self, error: LoadError) {
        self.phase = Phase::Error(error);
    }

    /// Leaves the guard window. Returns false if the draft was not populated.
    pub fn start_editing(&mut self) -> bool {
        if self.phase != Phase::Populated {
            return false;
        }
        self.phase = Phase::Editing;
        true
    }

    /// Writes fetched authoritative records into the draft.
    ///
    /// Slots the user already edited keep their local payload and only adopt
    /// the record id, so the next save updates instead of creating.
    pub fn populate(
        &mut self,
        records: Vec<LogRecord>,
        templates: &Templates,
        seeds: &HashMap<WorkoutType, WeightSeed>,
    ) -> PopulateSummary {
        let mut summary = PopulateSummary::default();
        let mut loaded = Vec::new();

        for record in records {
            let Ok(slot) = record.slot_key() else {
                continue;
            };
            let payload = normalize::normalize(templates, &slot, &record.payload);
            loaded.push(slot.clone());

            match self.slots.get_mut(&slot) {
                Some(state) if state.dirty => {
                    state.record_id = Some(record.id);
                    state.baseline = payload;
                    summary.kept_local += 1;
                }
                _ => {
                    self.slots
                        .insert(slot, SlotState::new(payload, Some(record.id)));
                    summary.restored += 1;
                }
            }
        }

        for (slot, state) in self.slots.iter_mut() {
            if state.dirty || loaded.contains(slot) {
                continue;
            }
            let seed = match slot {
                SlotKey::Workout(t) => seeds.get(t),
                SlotKey::Meal { .. } => None,
            };
            *state = SlotState::new(normalize::default_payload(templates, slot, seed), None);
        }

        self.phase = Phase::Populated;
        summary
    }

    fn edit(&mut self, slot: &SlotKey, apply: impl FnOnce(&mut Payload) -> bool) -> bool {
        let tracked = match self.phase {
            Phase::Uninitialized => return false,
            Phase::Populated => false,
            Phase::Loading | Phase::Editing | Phase::Error(_) => true,
        };
        let Some(state) = self.slots.get_mut(slot) else {
            return false;
        };
        if !apply(&mut state.payload) {
            return false;
        }
        if tracked {
            state.dirty = true;
            state.revision += 1;
        } else {
            state.baseline = state.payload.clone();
        }
        true
    }

    pub fn set_set_completed(
        &mut self,
        slot: &SlotKey,
        exercise: &str,
        set: usize,
        completed: bool,
    ) -> bool {
        self.edit(slot, |payload| {
            let Payload::Workout(workout) = payload else {
                return false;
            };
            let Some(entry) = workout
                .exercises
                .iter_mut()
                .find(|e| e.name == exercise)
                .and_then(|e| e.sets.get_mut(set))
            else {
                return false;
            };
            if entry.completed == completed {
                return false;
            }
            entry.completed = completed;
            true
        })
    }

    pub fn set_exercise_weight(&mut self, slot: &SlotKey, exercise: &str, weight: f64) -> bool {
        if !weight.is_finite() || weight < 0.0 {
            return false;
        }
        self.edit(slot, |payload| {
            let Payload::Workout(workout) = payload else {
                return false;
            };
            match workout.exercises.iter_mut().find(|e| e.name == exercise) {
                Some(entry) if entry.weight != weight => {
                    entry.weight = weight;
                    true
                }
                _ => false,
            }
        })
    }

    pub fn set_item_checked(&mut self, slot: &SlotKey, item: &str, checked: bool) -> bool {
        self.edit(slot, |payload| {
            let Payload::Nutrition(meal) = payload else {
                return false;
            };
            match meal.items.iter_mut().find(|i| i.name == item) {
                Some(entry) if entry.checked != checked => {
                    entry.checked = checked;
                    meal.recompute_totals();
                    true
                }
                _ => false,
            }
        })
    }

    pub fn set_item_amount(&mut self, slot: &SlotKey, item: &str, amount: f64) -> bool {
        if !amount.is_finite() || amount < 0.0 {
            return false;
        }
        self.edit(slot, |payload| {
            let Payload::Nutrition(meal) = payload else {
                return false;
            };
            match meal.items.iter_mut().find(|i| i.name == item) {
                Some(entry) if entry.amount != amount => {
                    entry.amount = amount;
                    meal.recompute_totals();
                    true
                }
                _ => false,
            }
        })
    }

    /// Snapshots of every dirty slot, taken at flush time.
    pub fn dirty_slots(&self) -> Vec<SlotSnapshot> {
        self.slots
            .iter()
            .filter(|(_, s)| s.dirty)
            .map(|(slot, s)| SlotSnapshot {
                slot: slot.clone(),
                payload: s.payload.clone(),
                record_id: s.record_id.clone(),
                revision: s.revision,
                changed: s.has_changes(),
            })
            .collect()
    }

    /// Records a finished write. The slot stays dirty if it was edited again
    /// after the snapshot was taken.
    pub fn acknowledge(
        &mut self,
        slot: &SlotKey,
        revision: u64,
        record_id: Option<String>,
        persisted: Payload,
    ) {
        let Some(state) = self.slots.get_mut(slot) else {
            return;
        };
        if record_id.is_some() {
            state.record_id = record_id;
        }
        state.baseline = persisted;
        if state.revision == revision {
            state.dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MenuType, NutritionPayload, WorkoutPayload};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn slot_a() -> SlotKey {
        SlotKey::Workout(WorkoutType::A)
    }

    fn workout_record(id: &str, squat_done: bool) -> LogRecord {
        let templates = Templates::default();
        let mut payload = normalize::normalize_workout(
            templates.workout(WorkoutType::A),
            &WorkoutPayload::default(),
            None,
        );
        payload.exercises[0].sets[0].completed = squat_done;
        payload.exercises[0].weight = 100.0;
        LogRecord {
            id: id.to_string(),
            date: date(),
            category: Category::Workout,
            workout_type: Some(WorkoutType::A),
            menu_type: None,
            meal_number: None,
            payload: Payload::Workout(payload),
            completed: Some(false),
            created_at: None,
            updated_at: Some("2024-05-01T10:00:00Z".to_string()),
        }
    }

    fn loading_draft(category: Category) -> Draft {
        let mut draft = Draft::new(date(), category, &Templates::default());
        draft.begin_loading();
        draft
    }

    #[test]
    fn test_new_draft_has_template_slots() {
        let draft = Draft::new(date(), Category::Workout, &Templates::default());
        assert_eq!(draft.phase(), &Phase::Uninitialized);
        assert_eq!(draft.slots().len(), 3);
        assert!(!draft.has_dirty());
    }

    #[test]
    fn test_uninitialized_rejects_edits() {
        let mut draft = Draft::new(date(), Category::Workout, &Templates::default());
        assert!(!draft.set_set_completed(&slot_a(), "Squat", 0, true));
    }

    #[test]
    fn test_populate_restores_records() {
        let mut draft = loading_draft(Category::Workout);
        let summary = draft.populate(
            vec![workout_record("w1", true)],
            &Templates::default(),
            &HashMap::new(),
        );
        assert_eq!(summary, PopulateSummary { restored: 1, kept_local: 0 });
        assert_eq!(draft.phase(), &Phase::Populated);
        let state = draft.slot(&slot_a()).unwrap();
        assert_eq!(state.record_id.as_deref(), Some("w1"));
        assert!(!state.dirty);
        let workout = state.payload.as_workout().unwrap();
        assert!(workout.exercises[0].sets[0].completed);
    }

    #[test]
    fn test_populate_keeps_local_edits() {
        let mut draft = loading_draft(Category::Workout);
        assert!(draft.set_exercise_weight(&slot_a(), "Squat", 60.0));

        let summary = draft.populate(
            vec![workout_record("w1", true)],
            &Templates::default(),
            &HashMap::new(),
        );
        assert_eq!(summary.kept_local, 1);

        let state = draft.slot(&slot_a()).unwrap();
        assert!(state.dirty);
        assert_eq!(state.record_id.as_deref(), Some("w1"));
        let workout = state.payload.as_workout().unwrap();
        assert_eq!(workout.exercises[0].weight, 60.0);
        assert!(!workout.exercises[0].sets[0].completed);
    }

    #[test]
    fn test_populate_seeds_missing_workouts() {
        let mut draft = loading_draft(Category::Workout);
        let mut seeds = HashMap::new();
        seeds.insert(
            WorkoutType::B,
            [("Deadlift".to_string(), 140.0)].into_iter().collect(),
        );
        draft.populate(Vec::new(), &Templates::default(), &seeds);

        let b = draft.slot(&SlotKey::Workout(WorkoutType::B)).unwrap();
        assert_eq!(b.payload.as_workout().unwrap().exercises[0].weight, 140.0);
        assert!(b.record_id.is_none());
        assert!(!b.has_changes());
    }

    #[test]
    fn test_populated_changes_are_not_edits() {
        let mut draft = loading_draft(Category::Workout);
        draft.populate(Vec::new(), &Templates::default(), &HashMap::new());

        assert!(draft.set_set_completed(&slot_a(), "Squat", 0, true));
        let state = draft.slot(&slot_a()).unwrap();
        assert!(!state.dirty);
        assert!(!state.has_changes());
    }

    #[test]
    fn test_editing_marks_dirty_and_bumps_revision() {
        let mut draft = loading_draft(Category::Workout);
        draft.populate(Vec::new(), &Templates::default(), &HashMap::new());
        assert!(draft.start_editing());

        assert!(draft.set_set_completed(&slot_a(), "Squat", 0, true));
        assert!(draft.set_set_completed(&slot_a(), "Squat", 1, true));
        let state = draft.slot(&slot_a()).unwrap();
        assert!(state.dirty);
        assert_eq!(state.revision, 2);

        // No-op edits and unknown targets are ignored.
        assert!(!draft.set_set_completed(&slot_a(), "Squat", 1, true));
        assert!(!draft.set_set_completed(&slot_a(), "Squat", 7, true));
        assert!(!draft.set_set_completed(&slot_a(), "Curl", 0, true));
        assert!(!draft.set_exercise_weight(&slot_a(), "Squat", f64::NAN));
    }

    #[test]
    fn test_start_editing_requires_populated() {
        let mut draft = loading_draft(Category::Workout);
        assert!(!draft.start_editing());
    }

    #[test]
    fn test_toggle_back_leaves_no_changes() {
        let mut draft = loading_draft(Category::Nutrition);
        draft.populate(Vec::new(), &Templates::default(), &HashMap::new());
        draft.start_editing();

        let slot = SlotKey::meal(MenuType::default(), 1);
        assert!(draft.set_item_checked(&slot, "Oats", true));
        let totals = draft.slot(&slot).unwrap().payload.as_nutrition().unwrap().totals;
        assert!(totals.calories > 0.0);
        assert!(draft.set_item_checked(&slot, "Oats", false));

        let snapshots = draft.dirty_slots();
        assert_eq!(snapshots.len(), 1);
        assert!(!snapshots[0].changed);
        assert_eq!(
            snapshots[0].payload.as_nutrition().unwrap().totals,
            NutritionPayload::default().totals
        );
    }

    #[test]
    fn test_item_amount_recomputes_totals() {
        let mut draft = loading_draft(Category::Nutrition);
        draft.populate(Vec::new(), &Templates::default(), &HashMap::new());
        draft.start_editing();

        let slot = SlotKey::meal(MenuType::default(), 1);
        draft.set_item_checked(&slot, "Oats", true);
        assert!(draft.set_item_amount(&slot, "Oats", 100.0));
        let meal = draft.slot(&slot).unwrap().payload.as_nutrition().unwrap().clone();
        assert_eq!(meal.totals.calories, 380.0);
        assert!(!draft.set_item_amount(&slot, "Oats", -5.0));
    }

    #[test]
    fn test_acknowledge_respects_newer_edits() {
        let mut draft = loading_draft(Category::Workout);
        draft.populate(Vec::new(), &Templates::default(), &HashMap::new());
        draft.start_editing();

        draft.set_set_completed(&slot_a(), "Squat", 0, true);
        let snapshot = draft.dirty_slots().remove(0);
        draft.set_set_completed(&slot_a(), "Squat", 1, true);

        draft.acknowledge(
            &snapshot.slot,
            snapshot.revision,
            Some("w9".to_string()),
            snapshot.payload.clone(),
        );
        let state = draft.slot(&slot_a()).unwrap();
        assert!(state.dirty);
        assert_eq!(state.record_id.as_deref(), Some("w9"));

        let latest = draft.dirty_slots().remove(0);
        draft.acknowledge(&latest.slot, latest.revision, None, latest.payload.clone());
        let state = draft.slot(&slot_a()).unwrap();
        assert!(!state.dirty);
        assert_eq!(state.record_id.as_deref(), Some("w9"));
    }
}
