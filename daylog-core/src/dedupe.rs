//! Collapses raw store records into one authoritative record per slot.
//!
//! The store may hold several records for the same `(date, category, slot)`
//! after retried creates or concurrent writers. The most recently written one
//! wins, compared as strings on `updated_at`, falling back to `created_at` and
//! then to the empty string. Records without any timestamp therefore lose to
//! every timestamped record and, among themselves, to whichever came first.

use std::collections::BTreeMap;

use crate::models::{LogRecord, SlotKey};

/// Returns one record per slot, ordered by slot key.
///
/// Records whose slot cannot be resolved are dropped. On equal recency the
/// record encountered first is kept.
pub fn dedupe(records: Vec<LogRecord>) -> Vec<LogRecord> {
    let mut winners: BTreeMap<SlotKey, LogRecord> = BTreeMap::new();

    for record in records {
        let slot = match record.slot_key() {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!("Dropping record during dedupe: {}", e);
                continue;
            }
        };

        match winners.get(&slot) {
            Some(current) if record.recency() <= current.recency() => {
                tracing::debug!(
                    "Record {} superseded by {} for {} on {}",
                    record.id,
                    current.id,
                    slot,
                    record.date
                );
            }
            _ => {
                winners.insert(slot, record);
            }
        }
    }

    winners.into_values().collect()
}

/// Records that lost to the authoritative record of their slot.
pub fn superseded(records: &[LogRecord]) -> Vec<&LogRecord> {
    let winners = dedupe(records.to_vec());
    records
        .iter()
        .filter(|r| r.slot_key().is_ok() && !winners.iter().any(|w| w.id == r.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, MenuType, NutritionPayload, Payload, WorkoutPayload, WorkoutType};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn meal(id: &str, menu: Option<&str>, number: u32, updated_at: Option<&str>) -> LogRecord {
        LogRecord {
            id: id.to_string(),
            date: date(),
            category: Category::Nutrition,
            workout_type: None,
            menu_type: menu.map(MenuType::new),
            meal_number: Some(number),
            payload: Payload::Nutrition(NutritionPayload::default()),
            completed: None,
            created_at: None,
            updated_at: updated_at.map(str::to_string),
        }
    }

    fn workout(id: &str, workout_type: WorkoutType, updated_at: &str) -> LogRecord {
        LogRecord {
            id: id.to_string(),
            date: date(),
            category: Category::Workout,
            workout_type: Some(workout_type),
            menu_type: None,
            meal_number: None,
            payload: Payload::Workout(WorkoutPayload::default()),
            completed: Some(false),
            created_at: None,
            updated_at: Some(updated_at.to_string()),
        }
    }

    fn ids(records: &[LogRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_newer_update_wins() {
        let records = vec![
            meal("t1", Some("weekday"), 1, Some("2024-05-01T08:00:00Z")),
            meal("t2", Some("weekday"), 1, Some("2024-05-01T09:00:00Z")),
        ];
        assert_eq!(ids(&dedupe(records)), vec!["t2"]);
    }

    #[test]
    fn test_created_at_used_when_updated_at_missing() {
        let mut older = meal("old", None, 1, Some("2024-05-01T08:00:00Z"));
        older.updated_at = None;
        older.created_at = Some("2024-05-01T08:00:00Z".to_string());
        let mut newer = meal("new", None, 1, None);
        newer.created_at = Some("2024-05-01T10:00:00Z".to_string());
        assert_eq!(ids(&dedupe(vec![newer, older])), vec!["new"]);
    }

    #[test]
    fn test_untimestamped_record_loses() {
        let records = vec![
            meal("bare", Some("weekday"), 1, None),
            meal("stamped", Some("weekday"), 1, Some("2024-01-01T00:00:00Z")),
        ];
        assert_eq!(ids(&dedupe(records)), vec!["stamped"]);
    }

    #[test]
    fn test_tie_keeps_first_encountered() {
        let records = vec![
            meal("first", Some("weekday"), 1, Some("T1")),
            meal("second", Some("weekday"), 1, Some("T1")),
        ];
        assert_eq!(ids(&dedupe(records)), vec!["first"]);
    }

    #[test]
    fn test_legacy_menu_groups_with_weekday() {
        let records = vec![
            meal("legacy", None, 2, Some("2024-05-01T12:00:00Z")),
            meal("current", Some("weekday"), 2, Some("2024-05-01T08:00:00Z")),
            meal("weekend", Some("weekend"), 2, Some("2024-05-01T07:00:00Z")),
        ];
        let result = dedupe(records);
        assert_eq!(ids(&result), vec!["legacy", "weekend"]);
    }

    #[test]
    fn test_one_record_per_slot() {
        let records = vec![
            workout("a1", WorkoutType::A, "T1"),
            workout("b1", WorkoutType::B, "T3"),
            workout("a2", WorkoutType::A, "T2"),
            workout("b0", WorkoutType::B, "T0"),
        ];
        assert_eq!(ids(&dedupe(records)), vec!["a2", "b1"]);
    }

    #[test]
    fn test_unresolvable_records_dropped() {
        let mut broken = workout("broken", WorkoutType::A, "T9");
        broken.workout_type = None;
        let records = vec![broken, workout("ok", WorkoutType::A, "T1")];
        assert_eq!(ids(&dedupe(records)), vec!["ok"]);
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            meal("a", Some("weekday"), 1, Some("T1")),
            meal("b", Some("weekday"), 1, Some("T3")),
            meal("c", None, 2, Some("T2")),
            meal("d", Some("weekday"), 2, Some("T1")),
            meal("e", Some("weekend"), 1, None),
        ];
        let once = dedupe(records);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_order_independent() {
        let records = vec![
            meal("a", Some("weekday"), 1, Some("T1")),
            meal("b", Some("weekday"), 1, Some("T3")),
            meal("c", None, 2, Some("T2")),
            meal("d", Some("weekday"), 2, Some("T4")),
            meal("e", Some("weekend"), 1, Some("T0")),
        ];
        let expected = dedupe(records.clone());

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(dedupe(reversed), expected);

        let mut rotated = records;
        rotated.rotate_left(2);
        assert_eq!(dedupe(rotated), expected);
    }

    #[test]
    fn test_superseded_lists_losers() {
        let records = vec![
            meal("t1", Some("weekday"), 1, Some("T1")),
            meal("t2", Some("weekday"), 1, Some("T2")),
            meal("solo", Some("weekday"), 2, Some("T1")),
        ];
        let losers: Vec<&str> = superseded(&records).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(losers, vec!["t1"]);
    }
}
