use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of daily log a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Workout,
    Nutrition,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Workout => "workout",
            Category::Nutrition => "nutrition",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "workout" => Ok(Category::Workout),
            "nutrition" => Ok(Category::Nutrition),
            _ => Err(format!(
                "Invalid category '{}'. Valid options: workout, nutrition",
                s
            )),
        }
    }
}

/// Workout rotation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkoutType {
    A,
    B,
    C,
}

impl WorkoutType {
    pub const ALL: [WorkoutType; 3] = [WorkoutType::A, WorkoutType::B, WorkoutType::C];
}

impl fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkoutType::A => write!(f, "A"),
            WorkoutType::B => write!(f, "B"),
            WorkoutType::C => write!(f, "C"),
        }
    }
}

impl FromStr for WorkoutType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "A" => Ok(WorkoutType::A),
            "B" => Ok(WorkoutType::B),
            "C" => Ok(WorkoutType::C),
            _ => Err(format!(
                "Invalid workout type '{}'. Valid options: A, B, C",
                s
            )),
        }
    }
}

/// Name of a meal template ("weekday", "weekend", ...).
///
/// Records written before menus existed carry no menu type; those resolve to
/// [`MenuType::DEFAULT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuType(String);

impl MenuType {
    pub const DEFAULT: &'static str = "weekday";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MenuType {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for MenuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MenuType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Menu type cannot be empty".to_string());
        }
        Ok(MenuType::new(trimmed))
    }
}

/// The smallest addressable unit of a day's log.
///
/// A day holds at most one authoritative record per slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKey {
    Workout(WorkoutType),
    Meal { menu: MenuType, number: u32 },
}

impl SlotKey {
    pub fn meal(menu: MenuType, number: u32) -> Self {
        SlotKey::Meal { menu, number }
    }

    pub fn category(&self) -> Category {
        match self {
            SlotKey::Workout(_) => Category::Workout,
            SlotKey::Meal { .. } => Category::Nutrition,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Workout(t) => write!(f, "workout {}", t),
            SlotKey::Meal { menu, number } => write!(f, "{} meal {}", menu, number),
        }
    }
}
