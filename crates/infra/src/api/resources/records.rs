//! `/records` endpoints and client-side record filters

use std::cmp::Reverse;

use chrono::{DateTime, NaiveDateTime};
use reqwest::Method;
use serde_json::Value;

use crate::api::client::{AuthenticatedApiClient, RequestOptions};
use crate::api::errors::ApiError;

/// Scanned documents and their extracted text
#[derive(Debug, Clone, Copy)]
pub struct RecordsApi<'a> {
    client: &'a AuthenticatedApiClient,
}

impl<'a> RecordsApi<'a> {
    pub fn new(client: &'a AuthenticatedApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Value, ApiError> {
        self.client.get_json("/records/").await
    }

    pub async fn get(&self, id: i64) -> Result<Value, ApiError> {
        self.client.get_json(&format!("/records/{id}")).await
    }

    pub async fn patch(&self, id: i64, changes: &Value) -> Result<Value, ApiError> {
        self.client.send_json(Method::PATCH, &format!("/records/{id}"), changes).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/records/{id}")).await.map(drop)
    }

    /// Replace the extracted text. The server takes it as a query
    /// parameter, not a body.
    pub async fn update_content(&self, id: i64, content: &str) -> Result<Value, ApiError> {
        self.client
            .request(
                Method::PATCH,
                &format!("/records/{id}/content"),
                None,
                RequestOptions::default().query("content", content),
            )
            .await?
            .json()
    }

    /// Rendered PDF of record `id`.
    pub async fn pdf(&self, id: i64) -> Result<Vec<u8>, ApiError> {
        let options = RequestOptions::default().header("accept", "application/pdf");
        let response =
            self.client.request(Method::GET, &format!("/records/{id}/pdf"), None, options).await?;
        Ok(response.into_bytes())
    }

    /// Record behind a share link. Sent without credentials.
    pub async fn shared(&self, share_token: &str) -> Result<Value, ApiError> {
        self.client
            .request(
                Method::GET,
                &format!("/records/share/{share_token}"),
                None,
                RequestOptions::default().public(),
            )
            .await?
            .json()
    }

    /// PDF of a shared record. Sent without credentials.
    pub async fn shared_pdf(&self, share_token: &str) -> Result<Vec<u8>, ApiError> {
        let options = RequestOptions::default().public().header("accept", "application/pdf");
        let response = self
            .client
            .request(Method::GET, &format!("/records/share/{share_token}/pdf"), None, options)
            .await?;
        Ok(response.into_bytes())
    }

    /// Copy a shared record into the signed-in account.
    pub async fn save_shared(&self, share_token: &str) -> Result<Value, ApiError> {
        self.client.post(&format!("/records/share/{share_token}/save"), None).await?.json()
    }

    /// Records not filed in any collection.
    pub async fn unorganized(&self) -> Result<Vec<Value>, ApiError> {
        Ok(unorganized_records(as_list(self.list().await?)?))
    }

    /// Records whose title, content or filename contain `query`, most
    /// recently updated first.
    pub async fn search(&self, query: &str) -> Result<Vec<Value>, ApiError> {
        Ok(search_records(as_list(self.list().await?)?, query))
    }
}

fn as_list(value: Value) -> Result<Vec<Value>, ApiError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(ApiError::Decode(format!("expected a list of records, got {}", kind(&other)))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Keep records without a `collection_id`.
pub fn unorganized_records(records: Vec<Value>) -> Vec<Value> {
    records
        .into_iter()
        .filter(|record| record.get("collection_id").map_or(true, Value::is_null))
        .collect()
}

/// Case-insensitive substring match over `title`, `content` and
/// `filename`, newest `updated_at` (else `created_at`) first. Records
/// without a parsable timestamp sort last. A blank query matches
/// everything.
pub fn search_records(records: Vec<Value>, query: &str) -> Vec<Value> {
    let needle = query.trim().to_lowercase();
    let mut matches: Vec<Value> = records
        .into_iter()
        .filter(|record| {
            needle.is_empty()
                || ["title", "content", "filename"].iter().any(|field| {
                    record
                        .get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
        })
        .collect();

    matches.sort_by_key(|record| Reverse(timestamp(record)));
    matches
}

fn timestamp(record: &Value) -> Option<NaiveDateTime> {
    ["updated_at", "created_at"]
        .iter()
        .filter_map(|field| record.get(field).and_then(Value::as_str))
        .find_map(parse_timestamp)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}
