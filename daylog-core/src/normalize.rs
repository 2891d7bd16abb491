//! Shapes payloads against the fixed template of their slot.
//!
//! Completion ratios are always computed against the template, so a day with
//! records for two exercises still reads "2 of 9", never "2 of 2".

use std::collections::HashMap;

use crate::models::{
    ExerciseLog, ExerciseTemplate, MealItem, MealItemTemplate, NutritionPayload, Payload, SetLog,
    SlotKey, Templates, WorkoutPayload,
};

/// Working weights carried over from an earlier session, keyed by exercise name.
pub type WeightSeed = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub done: usize,
    pub total: usize,
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }
}

impl std::fmt::Display for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.done, self.total)
    }
}

/// Template exercises in template order, followed by any extra exercises the
/// payload carries.
pub fn normalize_workout(
    template: &[ExerciseTemplate],
    payload: &WorkoutPayload,
    seed: Option<&WeightSeed>,
) -> WorkoutPayload {
    let mut exercises: Vec<ExerciseLog> = template
        .iter()
        .map(|t| match payload.exercise(&t.name) {
            Some(existing) => {
                let mut sets = existing.sets.clone();
                sets.resize(t.sets, SetLog::default());
                ExerciseLog {
                    name: t.name.clone(),
                    weight: existing.weight,
                    sets,
                }
            }
            None => {
                let weight = seed.and_then(|s| s.get(&t.name)).copied().unwrap_or(0.0);
                ExerciseLog::new(t.name.clone(), t.sets).with_weight(weight)
            }
        })
        .collect();

    exercises.extend(
        payload
            .exercises
            .iter()
            .filter(|e| !template.iter().any(|t| t.name == e.name))
            .cloned(),
    );

    WorkoutPayload { exercises }
}

pub fn completion(template: &[ExerciseTemplate], payload: &WorkoutPayload) -> Completion {
    let done = template
        .iter()
        .filter(|t| payload.exercise(&t.name).is_some_and(ExerciseLog::is_done))
        .count();
    Completion {
        done,
        total: template.len(),
    }
}

/// Template items in template order followed by extras; totals recomputed.
pub fn normalize_meal(template: &[MealItemTemplate], payload: &NutritionPayload) -> NutritionPayload {
    let mut items: Vec<MealItem> = template
        .iter()
        .map(|t| match payload.item(&t.name) {
            Some(existing) => existing.clone(),
            None => MealItem {
                name: t.name.clone(),
                amount: t.amount,
                checked: false,
                per_100: t.per_100,
            },
        })
        .collect();

    items.extend(
        payload
            .items
            .iter()
            .filter(|i| !template.iter().any(|t| t.name == i.name))
            .cloned(),
    );

    NutritionPayload::new(items)
}

/// Normalizes any payload against the template of `slot`.
pub fn normalize(templates: &Templates, slot: &SlotKey, payload: &Payload) -> Payload {
    match (slot, payload) {
        (SlotKey::Workout(t), Payload::Workout(w)) => {
            Payload::Workout(normalize_workout(templates.workout(*t), w, None))
        }
        (SlotKey::Meal { menu, number }, Payload::Nutrition(n)) => {
            Payload::Nutrition(normalize_meal(templates.meal(menu, *number), n))
        }
        _ => payload.clone(),
    }
}

/// The untouched template state of a slot.
pub fn default_payload(templates: &Templates, slot: &SlotKey, seed: Option<&WeightSeed>) -> Payload {
    match slot {
        SlotKey::Workout(t) => Payload::Workout(normalize_workout(
            templates.workout(*t),
            &WorkoutPayload::default(),
            seed,
        )),
        SlotKey::Meal { menu, number } => Payload::Nutrition(normalize_meal(
            templates.meal(menu, *number),
            &NutritionPayload::default(),
        )),
    }
}

/// `completed` flag stored alongside workout records.
pub fn completed_flag(templates: &Templates, slot: &SlotKey, payload: &Payload) -> Option<bool> {
    match (slot, payload) {
        (SlotKey::Workout(t), Payload::Workout(w)) => {
            Some(completion(templates.workout(*t), w).is_complete())
        }
        _ => None,
    }
}

/// Extracts working weights from a payload for seeding a later day.
pub fn weight_seed(payload: &WorkoutPayload) -> WeightSeed {
    payload
        .exercises
        .iter()
        .filter(|e| e.weight > 0.0)
        .map(|e| (e.name.clone(), e.weight))
        .collect()
}
