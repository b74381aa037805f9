//! `/user` endpoints

use reqwest::Method;
use serde_json::Value;
use sunga_domain::AccountUpdate;

use crate::api::client::AuthenticatedApiClient;
use crate::api::errors::ApiError;

/// Account of the signed-in user. Prefer
/// [`SessionService`](crate::api::SessionService) for these, which keeps
/// the cached profile and local session in step.
#[derive(Debug, Clone, Copy)]
pub struct UsersApi<'a> {
    client: &'a AuthenticatedApiClient,
}

impl<'a> UsersApi<'a> {
    pub fn new(client: &'a AuthenticatedApiClient) -> Self {
        Self { client }
    }

    /// `PUT /user`; returns the updated profile.
    pub async fn update(&self, update: &AccountUpdate) -> Result<Value, ApiError> {
        self.client.send_json(Method::PUT, "/user", update).await
    }

    pub async fn delete(&self) -> Result<(), ApiError> {
        self.client.delete("/user").await.map(drop)
    }
}
