use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{Filter, RecordStore};
use crate::error::StoreError;
use crate::models::{Category, LogRecord, NewLogRecord, RecordPatch};

/// Call counters, for checking how many round-trips an operation cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub creates: usize,
    pub updates: usize,
    pub filters: usize,
    pub ranges: usize,
    pub deletes: usize,
}

impl StoreStats {
    pub fn writes(&self) -> usize {
        self.creates + self.updates
    }

    pub fn reads(&self) -> usize {
        self.filters + self.ranges
    }
}

#[derive(Default)]
struct MemoryState {
    records: Vec<LogRecord>,
    last_timestamp: Option<DateTime<Utc>>,
    stats: StoreStats,
}

impl MemoryState {
    /// Strictly increasing, so string comparison orders writes.
    fn next_timestamp(&mut self) -> String {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
    }
}

/// In-process record store.
///
/// Behaves like the remote store, duplicates included: nothing stops two
/// records for the same slot from coexisting.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a record exactly as given.
    pub fn insert_raw(&self, record: LogRecord) {
        self.lock().records.push(record);
    }

    pub fn records(&self, category: Category) -> Vec<LogRecord> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats
    }
}

impl RecordStore for MemoryStore {
    async fn create(
        &self,
        category: Category,
        record: NewLogRecord,
    ) -> Result<LogRecord, StoreError> {
        let mut state = self.lock();
        state.stats.creates += 1;
        if record.category != category {
            return Err(StoreError::Malformed(format!(
                "{} record sent to {} collection",
                record.category, category
            )));
        }
        let timestamp = state.next_timestamp();
        let created = record.into_record(Uuid::new_v4().to_string(), timestamp);
        state.records.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        category: Category,
        id: &str,
        patch: RecordPatch,
    ) -> Result<LogRecord, StoreError> {
        let mut state = self.lock();
        state.stats.updates += 1;
        let timestamp = state.next_timestamp();
        let record = state
            .records
            .iter_mut()
            .find(|r| r.category == category && r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply(record, timestamp);
        Ok(record.clone())
    }

    async fn filter(
        &self,
        category: Category,
        filter: &Filter,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let mut state = self.lock();
        state.stats.filters += 1;
        Ok(state
            .records
            .iter()
            .filter(|r| r.category == category && filter.matches(r))
            .cloned()
            .collect())
    }

    async fn range_by_date(
        &self,
        category: Category,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let mut state = self.lock();
        state.stats.ranges += 1;
        let mut records: Vec<LogRecord> = state
            .records
            .iter()
            .filter(|r| r.category == category && r.date >= from && r.date <= to)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn delete(&self, category: Category, id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.stats.deletes += 1;
        let before = state.records.len();
        state
            .records
            .retain(|r| !(r.category == category && r.id == id));
        if state.records.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MenuType, NutritionPayload, Payload, SlotKey, WorkoutPayload, WorkoutType};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn new_workout(day: u32, workout_type: WorkoutType) -> NewLogRecord {
        NewLogRecord::new(
            date(day),
            &SlotKey::Workout(workout_type),
            Payload::Workout(WorkoutPayload::default()),
        )
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let a = store
            .create(Category::Workout, new_workout(1, WorkoutType::A))
            .await
            .unwrap();
        let b = store
            .create(Category::Workout, new_workout(1, WorkoutType::A))
            .await
            .unwrap();

        assert_ne!(a.id, b.id);
        assert!(b.recency() > a.recency());
        assert_eq!(store.records(Category::Workout).len(), 2);
        assert_eq!(store.stats().creates, 2);
    }

    #[tokio::test]
    async fn test_create_rejects_wrong_collection() {
        let store = MemoryStore::new();
        let result = store
            .create(Category::Nutrition, new_workout(1, WorkoutType::A))
            .await;
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_update_bumps_updated_at() {
        let store = MemoryStore::new();
        let created = store
            .create(Category::Workout, new_workout(1, WorkoutType::A))
            .await
            .unwrap();
        let updated = store
            .update(
                Category::Workout,
                &created.id,
                RecordPatch {
                    payload: created.payload.clone(),
                    completed: Some(true),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.recency() > created.recency());
        assert_eq!(updated.completed, Some(true));

        let missing = store
            .update(
                Category::Workout,
                "nope",
                RecordPatch {
                    payload: created.payload,
                    completed: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_filter_and_range() {
        let store = MemoryStore::new();
        for (day, t) in [(1, WorkoutType::A), (3, WorkoutType::B), (5, WorkoutType::A)] {
            store.create(Category::Workout, new_workout(day, t)).await.unwrap();
        }
        store
            .create(
                Category::Nutrition,
                NewLogRecord::new(
                    date(3),
                    &SlotKey::meal(MenuType::default(), 1),
                    Payload::Nutrition(NutritionPayload::default()),
                ),
            )
            .await
            .unwrap();

        let type_a = store
            .filter(Category::Workout, &Filter::new().eq("workout_type", "A"))
            .await
            .unwrap();
        assert_eq!(type_a.len(), 2);

        let on_day_3 = store
            .filter(Category::Workout, &Filter::new().date(date(3)))
            .await
            .unwrap();
        assert_eq!(on_day_3.len(), 1);

        let range = store
            .query(Category::Workout)
            .range_by_date(date(2), date(5))
            .exec()
            .await
            .unwrap();
        let days: Vec<NaiveDate> = range.iter().map(|r| r.date).collect();
        assert_eq!(days, vec![date(3), date(5)]);

        let inverted = store
            .query(Category::Workout)
            .range_by_date(date(5), date(1))
            .exec()
            .await
            .unwrap();
        assert!(inverted.is_empty());
        assert_eq!(store.stats().ranges, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        let created = store
            .create(Category::Workout, new_workout(1, WorkoutType::C))
            .await
            .unwrap();
        store.delete(Category::Workout, &created.id).await.unwrap();
        assert!(store.records(Category::Workout).is_empty());
        assert!(matches!(
            store.delete(Category::Workout, &created.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
