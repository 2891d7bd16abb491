use chrono::{NaiveDate, SecondsFormat, Utc};
use daylog_core::{
    Category, Filter, LogRecord, MenuType, NewLogRecord, RecordPatch, RecordStore, StoreError,
    WorkoutType,
};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// Record store backed by the local SQLite database.
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    category: String,
    date: String,
    workout_type: Option<String>,
    menu_type: Option<String>,
    meal_number: Option<i64>,
    payload: String,
    completed: Option<bool>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl RecordRow {
    fn into_record(self) -> Result<LogRecord, StoreError> {
        let id = self.id;
        let malformed = |what: String| StoreError::Malformed(format!("record {}: {}", id, what));

        let category: Category = self.category.parse().map_err(malformed)?;
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| malformed(format!("invalid date '{}': {}", self.date, e)))?;
        let workout_type = self
            .workout_type
            .as_deref()
            .map(str::parse::<WorkoutType>)
            .transpose()
            .map_err(malformed)?;
        let meal_number = self
            .meal_number
            .map(u32::try_from)
            .transpose()
            .map_err(|e| malformed(format!("invalid meal number: {}", e)))?;
        let payload = serde_json::from_str(&self.payload)
            .map_err(|e| malformed(format!("invalid payload: {}", e)))?;

        Ok(LogRecord {
            id,
            date,
            category,
            workout_type,
            menu_type: self.menu_type.map(MenuType::new),
            meal_number,
            payload,
            completed: self.completed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn transport(e: sqlx::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Maps a filter field to its column. Only slot and identity columns are
/// filterable.
fn filter_column(field: &str) -> Result<&'static str, StoreError> {
    match field {
        "id" => Ok("id"),
        "date" => Ok("date"),
        "workout_type" => Ok("workout_type"),
        "menu_type" => Ok("menu_type"),
        "meal_number" => Ok("meal_number"),
        "completed" => Ok("completed"),
        _ => Err(StoreError::InvalidFilter(field.to_string())),
    }
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get(&self, category: Category, id: &str) -> Result<Option<LogRecord>, StoreError> {
        let row: Option<RecordRow> =
            sqlx::query_as("SELECT * FROM log_records WHERE id = ? AND category = ?")
                .bind(id)
                .bind(category.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(transport)?;

        row.map(RecordRow::into_record).transpose()
    }

    async fn fetch(&self, mut query: QueryBuilder<'_, Sqlite>) -> Result<Vec<LogRecord>, StoreError> {
        let rows: Vec<RecordRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(transport)?;

        rows.into_iter().map(RecordRow::into_record).collect()
    }
}

impl RecordStore for SqliteStore {
    async fn create(
        &self,
        category: Category,
        record: NewLogRecord,
    ) -> Result<LogRecord, StoreError> {
        if record.category != category {
            return Err(StoreError::Malformed(format!(
                "{} record sent to {} collection",
                record.category, category
            )));
        }
        let id = Uuid::new_v4().to_string();
        let now = timestamp();
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO log_records (id, category, date, workout_type, menu_type, meal_number, payload, completed, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(category.as_str())
        .bind(record.date.to_string())
        .bind(record.workout_type.map(|t| t.to_string()))
        .bind(record.menu_type.as_ref().map(MenuType::as_str))
        .bind(record.meal_number.map(i64::from))
        .bind(&payload)
        .bind(record.completed)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(transport)?;

        Ok(record.into_record(id, now))
    }

    async fn update(
        &self,
        category: Category,
        id: &str,
        patch: RecordPatch,
    ) -> Result<LogRecord, StoreError> {
        let payload = serde_json::to_string(&patch.payload)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE log_records SET payload = ?, completed = ?, updated_at = ? WHERE id = ? AND category = ?",
        )
        .bind(&payload)
        .bind(patch.completed)
        .bind(timestamp())
        .bind(id)
        .bind(category.as_str())
        .execute(&self.pool)
        .await
        .map_err(transport)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.get(category, id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn filter(
        &self,
        category: Category,
        filter: &Filter,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let mut query = QueryBuilder::new("SELECT * FROM log_records WHERE category = ");
        query.push_bind(category.as_str());

        for (field, value) in filter.fields() {
            let column = filter_column(field)?;
            match value {
                Value::Null => {
                    query.push(format!(" AND {} IS NULL", column));
                }
                Value::Bool(b) => {
                    query.push(format!(" AND {} = ", column)).push_bind(*b);
                }
                Value::Number(n) => match n.as_i64() {
                    Some(i) => {
                        query.push(format!(" AND {} = ", column)).push_bind(i);
                    }
                    None => {
                        query
                            .push(format!(" AND {} = ", column))
                            .push_bind(n.as_f64().unwrap_or_default());
                    }
                },
                Value::String(s) => {
                    query.push(format!(" AND {} = ", column)).push_bind(s.clone());
                }
                Value::Array(_) | Value::Object(_) => {
                    return Err(StoreError::InvalidFilter(format!(
                        "{} (only scalar values are supported)",
                        field
                    )));
                }
            }
        }
        query.push(" ORDER BY date, created_at");

        self.fetch(query).await
    }

    async fn range_by_date(
        &self,
        category: Category,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let mut query = QueryBuilder::new("SELECT * FROM log_records WHERE category = ");
        query
            .push_bind(category.as_str())
            .push(" AND date >= ")
            .push_bind(from.to_string())
            .push(" AND date <= ")
            .push_bind(to.to_string())
            .push(" ORDER BY date, created_at");

        self.fetch(query).await
    }

    async fn delete(&self, category: Category, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM log_records WHERE id = ? AND category = ?")
            .bind(id)
            .bind(category.as_str())
            .execute(&self.pool)
            .await
            .map_err(transport)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
