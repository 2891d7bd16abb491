use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::{Category, MenuType, SlotKey, WorkoutType};
use super::payload::Payload;
use crate::error::RecordError;

/// A persisted log entry as the record store returns it.
///
/// Slot columns are flat and optional because the store holds rows written by
/// older clients; [`LogRecord::slot_key`] resolves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub date: NaiveDate,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout_type: Option<WorkoutType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_type: Option<MenuType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_number: Option<u32>,
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl LogRecord {
    /// Resolves the logical slot, treating a missing menu type as the default menu.
    pub fn slot_key(&self) -> Result<SlotKey, RecordError> {
        match self.category {
            Category::Workout => self
                .workout_type
                .map(SlotKey::Workout)
                .ok_or_else(|| RecordError::MissingWorkoutType {
                    id: self.id.clone(),
                }),
            Category::Nutrition => {
                let number = self
                    .meal_number
                    .ok_or_else(|| RecordError::MissingMealNumber {
                        id: self.id.clone(),
                    })?;
                Ok(SlotKey::meal(self.menu_type.clone().unwrap_or_default(), number))
            }
        }
    }

    /// Checks that the slot resolves and the payload matches the category.
    pub fn validate(&self) -> Result<SlotKey, RecordError> {
        let slot = self.slot_key()?;
        let payload = self.payload.category();
        if payload != self.category {
            return Err(RecordError::PayloadMismatch {
                id: self.id.clone(),
                category: self.category,
                payload,
            });
        }
        Ok(slot)
    }

    /// Recency used to pick the authoritative record of a slot.
    pub fn recency(&self) -> &str {
        self.updated_at
            .as_deref()
            .or(self.created_at.as_deref())
            .unwrap_or("")
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self
            .slot_key()
            .map(|s| s.to_string())
            .unwrap_or_else(|_| "unknown slot".to_string());
        write!(f, "{} {} [{}] {}", self.date, self.category, self.id, slot)?;
        if let Some(updated) = self.updated_at.as_deref().or(self.created_at.as_deref()) {
            write!(f, " @ {}", updated)?;
        }
        Ok(())
    }
}

/// Body of a create request; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogRecord {
    pub date: NaiveDate,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout_type: Option<WorkoutType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_type: Option<MenuType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_number: Option<u32>,
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl NewLogRecord {
    pub fn new(date: NaiveDate, slot: &SlotKey, payload: Payload) -> Self {
        let (workout_type, menu_type, meal_number) = match slot {
            SlotKey::Workout(t) => (Some(*t), None, None),
            SlotKey::Meal { menu, number } => (None, Some(menu.clone()), Some(*number)),
        };
        Self {
            date,
            category: slot.category(),
            workout_type,
            menu_type,
            meal_number,
            payload,
            completed: None,
        }
    }

    pub fn with_completed(mut self, completed: Option<bool>) -> Self {
        self.completed = completed;
        self
    }

    /// Materializes the record with store-assigned fields.
    pub fn into_record(self, id: impl Into<String>, timestamp: impl Into<String>) -> LogRecord {
        let timestamp = timestamp.into();
        LogRecord {
            id: id.into(),
            date: self.date,
            category: self.category,
            workout_type: self.workout_type,
            menu_type: self.menu_type,
            meal_number: self.meal_number,
            payload: self.payload,
            completed: self.completed,
            created_at: Some(timestamp.clone()),
            updated_at: Some(timestamp),
        }
    }
}

/// Body of an update request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl RecordPatch {
    pub fn apply(self, record: &mut LogRecord, timestamp: impl Into<String>) {
        record.payload = self.payload;
        record.completed = self.completed;
        record.updated_at = Some(timestamp.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NutritionPayload, WorkoutPayload};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn meal_record(menu: Option<&str>, meal: Option<u32>) -> LogRecord {
        LogRecord {
            id: "m1".to_string(),
            date: date(),
            category: Category::Nutrition,
            workout_type: None,
            menu_type: menu.map(MenuType::new),
            meal_number: meal,
            payload: Payload::Nutrition(NutritionPayload::default()),
            completed: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_legacy_menu_defaults_to_weekday() {
        let record = meal_record(None, Some(2));
        assert_eq!(
            record.slot_key().unwrap(),
            SlotKey::meal(MenuType::default(), 2)
        );
    }

    #[test]
    fn test_missing_meal_number_is_error() {
        let record = meal_record(Some("weekend"), None);
        assert!(matches!(
            record.slot_key(),
            Err(RecordError::MissingMealNumber { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_payload_mismatch() {
        let mut record = meal_record(None, Some(1));
        record.payload = Payload::Workout(WorkoutPayload::default());
        assert!(matches!(
            record.validate(),
            Err(RecordError::PayloadMismatch { .. })
        ));
    }

    #[test]
    fn test_recency_fallbacks() {
        let mut record = meal_record(None, Some(1));
        assert_eq!(record.recency(), "");
        record.created_at = Some("2024-05-01T08:00:00Z".to_string());
        assert_eq!(record.recency(), "2024-05-01T08:00:00Z");
        record.updated_at = Some("2024-05-01T09:00:00Z".to_string());
        assert_eq!(record.recency(), "2024-05-01T09:00:00Z");
    }

    #[test]
    fn test_new_record_slot_columns() {
        let new = NewLogRecord::new(
            date(),
            &SlotKey::Workout(WorkoutType::B),
            Payload::Workout(WorkoutPayload::default()),
        )
        .with_completed(Some(false));
        let record = new.into_record("w1", "2024-05-01T10:00:00Z");
        assert_eq!(record.category, Category::Workout);
        assert_eq!(record.workout_type, Some(WorkoutType::B));
        assert!(record.menu_type.is_none());
        assert_eq!(record.slot_key().unwrap(), SlotKey::Workout(WorkoutType::B));
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_record_json_omits_empty_columns() {
        let record = meal_record(None, Some(1));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["category"], "nutrition");
        assert_eq!(json["date"], "2024-05-01");
        assert!(json.get("menu_type").is_none());
        assert!(json.get("updated_at").is_none());
    }
}
