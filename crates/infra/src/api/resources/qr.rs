//! Share-link QR codes

use crate::api::client::{AuthenticatedApiClient, RequestBody};
use crate::api::errors::ApiError;

/// QR code generation. Responses are PNG bytes.
#[derive(Debug, Clone, Copy)]
pub struct QrApi<'a> {
    client: &'a AuthenticatedApiClient,
}

impl<'a> QrApi<'a> {
    pub fn new(client: &'a AuthenticatedApiClient) -> Self {
        Self { client }
    }

    pub async fn record(&self, id: i64) -> Result<Vec<u8>, ApiError> {
        self.png(&format!("/qr/record/{id}")).await
    }

    pub async fn collection(&self, id: i64) -> Result<Vec<u8>, ApiError> {
        self.png(&format!("/qr/collection/{id}")).await
    }

    async fn png(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let body = RequestBody::Json(serde_json::json!({}));
        Ok(self.client.post(path, Some(body)).await?.into_bytes())
    }
}
