use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

use super::category::Category;

/// Energy and macronutrients. Item templates express these per 100 g.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein: self.protein * factor,
            carbs: self.carbs * factor,
            fat: self.fat * factor,
        }
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Macros) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SetLog {
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseLog {
    pub name: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub sets: Vec<SetLog>,
}

impl ExerciseLog {
    pub fn new(name: impl Into<String>, sets: usize) -> Self {
        Self {
            name: name.into(),
            weight: 0.0,
            sets: vec![SetLog::default(); sets],
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// An exercise counts as done once it has sets and all of them are completed.
    pub fn is_done(&self) -> bool {
        !self.sets.is_empty() && self.sets.iter().all(|s| s.completed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPayload {
    pub exercises: Vec<ExerciseLog>,
}

impl WorkoutPayload {
    pub fn exercise(&self, name: &str) -> Option<&ExerciseLog> {
        self.exercises.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealItem {
    pub name: String,
    /// Grams consumed.
    pub amount: f64,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub per_100: Macros,
}

impl MealItem {
    pub fn macros(&self) -> Macros {
        self.per_100.scale(self.amount / 100.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionPayload {
    pub items: Vec<MealItem>,
    #[serde(default)]
    pub totals: Macros,
}

impl NutritionPayload {
    pub fn new(items: Vec<MealItem>) -> Self {
        let mut payload = Self {
            items,
            totals: Macros::default(),
        };
        payload.recompute_totals();
        payload
    }

    /// Totals only ever count checked items.
    pub fn recompute_totals(&mut self) {
        self.totals = self
            .items
            .iter()
            .filter(|i| i.checked)
            .fold(Macros::default(), |acc, i| acc + i.macros());
    }

    pub fn item(&self, name: &str) -> Option<&MealItem> {
        self.items.iter().find(|i| i.name == name)
    }
}

/// Category-specific body of a log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Workout(WorkoutPayload),
    Nutrition(NutritionPayload),
}

impl Payload {
    pub fn category(&self) -> Category {
        match self {
            Payload::Workout(_) => Category::Workout,
            Payload::Nutrition(_) => Category::Nutrition,
        }
    }

    pub fn as_workout(&self) -> Option<&WorkoutPayload> {
        match self {
            Payload::Workout(w) => Some(w),
            Payload::Nutrition(_) => None,
        }
    }

    pub fn as_nutrition(&self) -> Option<&NutritionPayload> {
        match self {
            Payload::Nutrition(n) => Some(n),
            Payload::Workout(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oats(checked: bool) -> MealItem {
        MealItem {
            name: "Oats".to_string(),
            amount: 50.0,
            checked,
            per_100: Macros::new(380.0, 13.0, 60.0, 7.0),
        }
    }

    #[test]
    fn test_exercise_done_requires_all_sets() {
        let mut ex = ExerciseLog::new("Squat", 3);
        assert!(!ex.is_done());
        ex.sets[0].completed = true;
        ex.sets[1].completed = true;
        assert!(!ex.is_done());
        ex.sets[2].completed = true;
        assert!(ex.is_done());
        assert!(!ExerciseLog::new("Plank", 0).is_done());
    }

    #[test]
    fn test_totals_count_checked_items_only() {
        let mut banana = oats(false);
        banana.name = "Banana".to_string();
        let payload = NutritionPayload::new(vec![oats(true), banana]);
        assert_eq!(payload.totals.calories, 190.0);
        assert_eq!(payload.totals.protein, 6.5);
    }

    #[test]
    fn test_payload_untagged_json() {
        let workout = Payload::Workout(WorkoutPayload {
            exercises: vec![ExerciseLog::new("Squat", 2).with_weight(80.0)],
        });
        let json = serde_json::to_value(&workout).unwrap();
        assert_eq!(json["exercises"][0]["weight"], 80.0);
        let parsed: Payload = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.category(), Category::Workout);

        let nutrition: Payload =
            serde_json::from_str(r#"{"items":[{"name":"Oats","amount":50}]}"#).unwrap();
        assert_eq!(nutrition.category(), Category::Nutrition);
        assert!(!nutrition.as_nutrition().unwrap().items[0].checked);
    }
}
