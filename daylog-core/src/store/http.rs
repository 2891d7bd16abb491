//! HTTP client for a REST record store.
//!
//! Endpoints, relative to the base URL:
//! - `POST   /records/{category}`: create, body is a [`NewLogRecord`]
//! - `PATCH  /records/{category}/{id}`: update, body is a [`RecordPatch`]
//! - `GET    /records/{category}?field=value&...`: equality filter
//! - `GET    /records/{category}?from=YYYY-MM-DD&to=YYYY-MM-DD`: date range
//! - `DELETE /records/{category}/{id}`

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Filter, RecordStore};
use crate::error::StoreError;
use crate::models::{Category, LogRecord, NewLogRecord, RecordPatch};

#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, category: Category) -> String {
        format!("{}/records/{}", self.base_url, category)
    }

    fn record_url(&self, category: Category, id: &str) -> String {
        format!("{}/{}", self.collection_url(category), id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

/// Renders a filter value as a query parameter.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl RecordStore for HttpStore {
    async fn create(
        &self,
        category: Category,
        record: NewLogRecord,
    ) -> Result<LogRecord, StoreError> {
        let request = self.client.post(self.collection_url(category)).json(&record);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn update(
        &self,
        category: Category,
        id: &str,
        patch: RecordPatch,
    ) -> Result<LogRecord, StoreError> {
        let request = self.client.patch(self.record_url(category, id)).json(&patch);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn filter(
        &self,
        category: Category,
        filter: &Filter,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let params: Vec<(String, String)> = filter
            .fields()
            .map(|(field, value)| (field.to_string(), query_value(value)))
            .collect();
        let request = self.client.get(self.collection_url(category)).query(&params);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn range_by_date(
        &self,
        category: Category,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let params = [("from", from.to_string()), ("to", to.to_string())];
        let request = self.client.get(self.collection_url(category)).query(&params);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn delete(&self, category: Category, id: &str) -> Result<(), StoreError> {
        let request = self.client.delete(self.record_url(category, id));
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let store = HttpStore::new("https://logs.example.com/api/", None);
        assert_eq!(store.base_url(), "https://logs.example.com/api");
        assert_eq!(
            store.collection_url(Category::Nutrition),
            "https://logs.example.com/api/records/nutrition"
        );
        assert_eq!(
            store.record_url(Category::Workout, "abc"),
            "https://logs.example.com/api/records/workout/abc"
        );
    }

    #[test]
    fn test_query_values() {
        assert_eq!(query_value(&Value::from("2024-05-01")), "2024-05-01");
        assert_eq!(query_value(&Value::from(3)), "3");
        assert_eq!(query_value(&Value::Bool(true)), "true");
        assert_eq!(query_value(&Value::Null), "");
    }

    mod server {
        use super::*;
        use crate::models::{Payload, WorkoutPayload, WorkoutType};
        use axum::{
            extract::{Path, Query},
            http::{header, HeaderMap, StatusCode},
            response::{IntoResponse, Response},
            routing::{delete, get},
            Json, Router,
        };
        use std::collections::HashMap;

        fn day(d: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
        }

        fn record() -> LogRecord {
            LogRecord {
                id: "rec-1".to_string(),
                date: day(1),
                category: Category::Workout,
                workout_type: Some(WorkoutType::A),
                menu_type: None,
                meal_number: None,
                payload: Payload::Workout(WorkoutPayload::default()),
                completed: Some(false),
                created_at: Some("2024-05-01T07:00:00Z".to_string()),
                updated_at: Some("2024-05-01T07:00:00Z".to_string()),
            }
        }

        async fn list(
            headers: HeaderMap,
            Path(category): Path<String>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Response {
            let authorized = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                == Some("Bearer secret");
            if !authorized {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            if category != "workout" {
                return StatusCode::BAD_REQUEST.into_response();
            }
            match params.get("date").map(String::as_str) {
                Some("2024-05-01") => Json(vec![record()]).into_response(),
                Some("2024-05-02") => "not json".into_response(),
                _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            }
        }

        async fn remove(Path((_category, _id)): Path<(String, String)>) -> StatusCode {
            StatusCode::NOT_FOUND
        }

        async fn serve() -> String {
            let app = Router::new()
                .route("/records/{category}", get(list))
                .route("/records/{category}/{id}", delete(remove));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{}", addr)
        }

        #[tokio::test]
        async fn test_bearer_key_is_sent() {
            let url = serve().await;
            let store = HttpStore::new(&url, Some("secret".to_string()));

            let records = store
                .filter(Category::Workout, &Filter::new().date(day(1)))
                .await
                .unwrap();
            assert_eq!(records, vec![record()]);
        }

        #[tokio::test]
        async fn test_error_status_maps_to_status() {
            let url = serve().await;

            let anonymous = HttpStore::new(&url, None);
            let result = anonymous
                .filter(Category::Workout, &Filter::new().date(day(1)))
                .await;
            assert!(matches!(result, Err(StoreError::Status(401))));

            let store = HttpStore::new(&url, Some("secret".to_string()));
            let result = store
                .filter(Category::Workout, &Filter::new().date(day(3)))
                .await;
            assert!(matches!(result, Err(StoreError::Status(500))));
        }

        #[tokio::test]
        async fn test_undecodable_body_is_malformed() {
            let url = serve().await;
            let store = HttpStore::new(&url, Some("secret".to_string()));

            let result = store
                .filter(Category::Workout, &Filter::new().date(day(2)))
                .await;
            assert!(matches!(result, Err(StoreError::Malformed(_))));
        }

        #[tokio::test]
        async fn test_missing_record_maps_to_not_found() {
            let url = serve().await;
            let store = HttpStore::new(&url, Some("secret".to_string()));

            let result = store.delete(Category::Workout, "gone").await;
            assert!(matches!(result, Err(StoreError::NotFound(_))));
        }
    }
}
