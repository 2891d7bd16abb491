use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::category::{Category, MenuType, SlotKey, WorkoutType};
use super::payload::Macros;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTemplate {
    pub name: String,
    pub sets: usize,
}

impl ExerciseTemplate {
    pub fn new(name: impl Into<String>, sets: usize) -> Self {
        Self {
            name: name.into(),
            sets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealItemTemplate {
    pub name: String,
    /// Planned grams.
    pub amount: f64,
    #[serde(default)]
    pub per_100: Macros,
}

impl MealItemTemplate {
    pub fn new(name: impl Into<String>, amount: f64, per_100: Macros) -> Self {
        Self {
            name: name.into(),
            amount,
            per_100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealTemplate {
    pub number: u32,
    pub items: Vec<MealItemTemplate>,
}

/// The fixed plan every day's log is measured against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Templates {
    pub workouts: BTreeMap<WorkoutType, Vec<ExerciseTemplate>>,
    pub menus: BTreeMap<MenuType, Vec<MealTemplate>>,
}

impl Templates {
    pub fn workout(&self, workout_type: WorkoutType) -> &[ExerciseTemplate] {
        self.workouts
            .get(&workout_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn meal(&self, menu: &MenuType, number: u32) -> &[MealItemTemplate] {
        self.menus
            .get(menu)
            .and_then(|meals| meals.iter().find(|m| m.number == number))
            .map(|m| m.items.as_slice())
            .unwrap_or(&[])
    }

    /// Every slot the template defines for a category, in slot order.
    pub fn slots(&self, category: Category) -> Vec<SlotKey> {
        match category {
            Category::Workout => self.workouts.keys().copied().map(SlotKey::Workout).collect(),
            Category::Nutrition => self
                .menus
                .iter()
                .flat_map(|(menu, meals)| {
                    meals
                        .iter()
                        .map(move |m| SlotKey::meal(menu.clone(), m.number))
                })
                .collect(),
        }
    }
}

fn exercises(names: &[&str]) -> Vec<ExerciseTemplate> {
    names.iter().map(|n| ExerciseTemplate::new(*n, 3)).collect()
}

impl Default for Templates {
    fn default() -> Self {
        let mut workouts = BTreeMap::new();
        workouts.insert(
            WorkoutType::A,
            exercises(&[
                "Squat",
                "Bench Press",
                "Barbell Row",
                "Overhead Press",
                "Romanian Deadlift",
                "Pull Up",
                "Dip",
                "Plank",
                "Calf Raise",
            ]),
        );
        workouts.insert(
            WorkoutType::B,
            exercises(&[
                "Deadlift",
                "Incline Press",
                "Lat Pulldown",
                "Lunge",
                "Face Pull",
                "Leg Curl",
                "Biceps Curl",
                "Triceps Extension",
                "Hanging Leg Raise",
            ]),
        );
        workouts.insert(
            WorkoutType::C,
            exercises(&[
                "Front Squat",
                "Push Up",
                "Seated Row",
                "Hip Thrust",
                "Lateral Raise",
                "Leg Press",
                "Chin Up",
                "Farmer Carry",
                "Ab Wheel",
            ]),
        );

        let oats = MealItemTemplate::new("Oats", 60.0, Macros::new(380.0, 13.0, 60.0, 7.0));
        let milk = MealItemTemplate::new("Milk", 200.0, Macros::new(64.0, 3.4, 4.8, 3.6));
        let banana = MealItemTemplate::new("Banana", 120.0, Macros::new(89.0, 1.1, 23.0, 0.3));
        let rice = MealItemTemplate::new("Rice", 150.0, Macros::new(130.0, 2.7, 28.0, 0.3));
        let chicken =
            MealItemTemplate::new("Chicken Breast", 150.0, Macros::new(165.0, 31.0, 0.0, 3.6));
        let broccoli = MealItemTemplate::new("Broccoli", 100.0, Macros::new(34.0, 2.8, 7.0, 0.4));
        let salmon = MealItemTemplate::new("Salmon", 150.0, Macros::new(208.0, 20.0, 0.0, 13.0));
        let potato = MealItemTemplate::new("Potato", 200.0, Macros::new(77.0, 2.0, 17.0, 0.1));
        let yogurt = MealItemTemplate::new("Greek Yogurt", 170.0, Macros::new(97.0, 9.0, 3.6, 5.0));
        let eggs = MealItemTemplate::new("Eggs", 120.0, Macros::new(155.0, 13.0, 1.1, 11.0));

        let mut menus = BTreeMap::new();
        menus.insert(
            MenuType::new("weekday"),
            vec![
                MealTemplate {
                    number: 1,
                    items: vec![oats, milk.clone(), banana.clone()],
                },
                MealTemplate {
                    number: 2,
                    items: vec![rice.clone(), chicken, broccoli.clone()],
                },
                MealTemplate {
                    number: 3,
                    items: vec![salmon.clone(), potato.clone(), broccoli.clone()],
                },
            ],
        );
        menus.insert(
            MenuType::new("weekend"),
            vec![
                MealTemplate {
                    number: 1,
                    items: vec![eggs, yogurt, banana],
                },
                MealTemplate {
                    number: 2,
                    items: vec![salmon, potato, broccoli, rice, milk],
                },
            ],
        );

        Self { workouts, menus }
    }
}
