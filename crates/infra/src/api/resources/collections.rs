//! `/collections` endpoints

use reqwest::Method;
use serde_json::Value;

use crate::api::client::{AuthenticatedApiClient, RequestOptions};
use crate::api::errors::ApiError;

/// Folders of records owned by the signed-in user
#[derive(Debug, Clone, Copy)]
pub struct CollectionsApi<'a> {
    client: &'a AuthenticatedApiClient,
}

impl<'a> CollectionsApi<'a> {
    pub fn new(client: &'a AuthenticatedApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Value, ApiError> {
        self.client.get_json("/collections/").await
    }

    pub async fn get(&self, id: i64) -> Result<Value, ApiError> {
        self.client.get_json(&format!("/collections/{id}")).await
    }

    pub async fn create(&self, collection: &Value) -> Result<Value, ApiError> {
        self.client.send_json(Method::POST, "/collections/", collection).await
    }

    pub async fn update(&self, id: i64, collection: &Value) -> Result<Value, ApiError> {
        self.client.send_json(Method::PUT, &format!("/collections/{id}"), collection).await
    }

    pub async fn patch(&self, id: i64, changes: &Value) -> Result<Value, ApiError> {
        self.client.send_json(Method::PATCH, &format!("/collections/{id}"), changes).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/collections/{id}")).await.map(drop)
    }

    /// Records filed in collection `id`.
    pub async fn records(&self, id: i64) -> Result<Value, ApiError> {
        self.client.get_json(&format!("/collections/{id}/records")).await
    }

    pub async fn add_record(&self, collection_id: i64, record_id: i64) -> Result<Value, ApiError> {
        self.client
            .put(&format!("/collections/{collection_id}/records/{record_id}"), None)
            .await?
            .json()
    }

    pub async fn remove_record(&self, collection_id: i64, record_id: i64) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/collections/{collection_id}/records/{record_id}"))
            .await
            .map(drop)
    }

    /// Collection behind a share link. Sent without credentials.
    pub async fn shared(&self, share_token: &str) -> Result<Value, ApiError> {
        self.client
            .request(
                Method::GET,
                &format!("/collections/share/{share_token}"),
                None,
                RequestOptions::default().public(),
            )
            .await?
            .json()
    }

    /// Copy a shared collection into the signed-in account.
    pub async fn save_shared(&self, share_token: &str) -> Result<Value, ApiError> {
        self.client.post(&format!("/collections/share/{share_token}/save"), None).await?.json()
    }
}
