//! Authenticated API client with refresh-and-retry on 401
//!
//! Every request goes through the same pipeline:
//!
//! 1. **Attach**: read the stored credentials and set
//!    `Authorization: <token_type> <access_token>` (no header when signed
//!    out or when the request is public).
//! 2. **Send** once with the configured timeout.
//! 3. **Recover**: a 401 on an authenticated request that has not been
//!    retried yet asks the [`AccessTokenProvider`] for fresh credentials.
//!    Concurrent recoveries are coalesced by the provider, so a burst of
//!    401s costs one `/refresh` call.
//! 4. **Retry** once with the new header. Whatever comes back is final.
//!
//! Non-2xx responses become [`ApiError::Http`]; a failed recovery becomes
//! [`ApiError::Auth`] after the session has been cleared and announced.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sunga_common::auth::Credentials;
use sunga_domain::ApiConfig;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::auth::AccessTokenProvider;
use super::errors::ApiError;
use crate::http::{join_url, HttpClient};

/// One file in a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Request payload
///
/// Bodies are owned so the request can be rebuilt for the retry; a
/// multipart form cannot be cloned once handed to reqwest.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
    Multipart(Vec<UploadPart>),
    Text(String),
}

impl RequestBody {
    /// Serialize `value` as a JSON body.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if `value` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| ApiError::Config(format!("Failed to serialize body: {e}")))
    }

    fn apply(&self, builder: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        Ok(match self {
            Self::Json(value) => builder.json(value),
            Self::Form(pairs) => builder.form(pairs),
            Self::Text(text) => builder.header(CONTENT_TYPE, "text/plain").body(text.clone()),
            Self::Multipart(parts) => {
                let mut form = Form::new();
                for part in parts {
                    let file = Part::bytes(part.bytes.clone())
                        .file_name(part.file_name.clone())
                        .mime_str(&part.mime)
                        .map_err(|e| ApiError::Config(format!("invalid MIME type {}: {e}", part.mime)))?;
                    form = form.part(part.field.clone(), file);
                }
                builder.multipart(form)
            }
        })
    }
}

/// Per-request knobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Send without credentials and never refresh. Used for share links.
    pub skip_auth: bool,
    /// Overrides the client-wide timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Buffered response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON. An empty body (204) decodes as `null`.
    ///
    /// # Errors
    /// Returns `ApiError::Decode` if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.body.is_empty() {
            return serde_json::from_value(Value::Null).map_err(|_| {
                ApiError::Decode(format!(
                    "empty response ({}) cannot be decoded into the expected type",
                    self.status.as_u16()
                ))
            });
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::Decode(format!("Failed to parse response: {e}")))
    }

    fn into_result(self) -> Result<Self, ApiError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_response(self.status, &self.body))
        }
    }
}

/// An outbound request and whether it has already been retried
#[derive(Debug)]
pub struct PendingRequest {
    method: Method,
    url: Url,
    body: Option<RequestBody>,
    options: RequestOptions,
    retried: bool,
}

impl PendingRequest {
    fn new(method: Method, url: Url, body: Option<RequestBody>, options: RequestOptions) -> Self {
        Self { method, url, body, options, retried: false }
    }

    /// A 401 is recoverable once, and only on authenticated requests.
    fn should_recover(&self, status: StatusCode) -> bool {
        status == StatusCode::UNAUTHORIZED && !self.retried && !self.options.skip_auth
    }
}

/// API client that attaches and recovers credentials
#[derive(Clone)]
pub struct AuthenticatedApiClient {
    http: HttpClient,
    base_url: String,
    auth: Arc<dyn AccessTokenProvider>,
}

impl AuthenticatedApiClient {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        auth: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self { http, base_url: base_url.into(), auth }
    }

    /// Build the HTTP client from `config` and wrap it.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the HTTP client cannot be built.
    pub fn from_config(
        config: &ApiConfig,
        auth: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self, ApiError> {
        let http = HttpClient::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self::new(http, config.base_url.clone(), auth))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request through the attach/recover/retry pipeline.
    ///
    /// # Errors
    /// - `Network`: no response (including timeouts)
    /// - `Http`: non-2xx response, including a 401 on the retried request
    /// - `Auth`: the session could not be recovered and has been ended
    /// - `Config`: the path or body could not form a request
    #[instrument(skip(self, body, options), fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let mut url = join_url(&self.base_url, path)?;
        if !options.query.is_empty() {
            url.query_pairs_mut().extend_pairs(options.query.iter());
        }
        let mut pending = PendingRequest::new(method, url, body, options);

        let sent_with = self.attach(&pending).await;
        let response = self.dispatch(&pending, sent_with.as_ref()).await?;
        if !pending.should_recover(response.status) {
            return response.into_result();
        }

        pending.retried = true;
        debug!(authenticated = sent_with.is_some(), "request rejected; recovering session");
        let rejected = sent_with.as_ref().map(|c| c.access_token.as_str());
        let refreshed = self.auth.recover(rejected).await?;

        let response = self.dispatch(&pending, Some(&refreshed)).await?;
        info!(status = %response.status, "request retried with refreshed credentials");
        response.into_result()
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::GET, path, None, RequestOptions::default()).await
    }

    pub async fn post(&self, path: &str, body: Option<RequestBody>) -> Result<ApiResponse, ApiError> {
        self.request(Method::POST, path, body, RequestOptions::default()).await
    }

    pub async fn put(&self, path: &str, body: Option<RequestBody>) -> Result<ApiResponse, ApiError> {
        self.request(Method::PUT, path, body, RequestOptions::default()).await
    }

    pub async fn patch(&self, path: &str, body: Option<RequestBody>) -> Result<ApiResponse, ApiError> {
        self.request(Method::PATCH, path, body, RequestOptions::default()).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::DELETE, path, None, RequestOptions::default()).await
    }

    /// `GET` and decode the JSON body.
    ///
    /// # Errors
    /// As [`Self::request`], plus `Decode` for an unexpected body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get(path).await?.json()
    }

    /// Send `body` as JSON and decode the JSON response.
    ///
    /// # Errors
    /// As [`Self::request`], plus `Decode` for an unexpected body.
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)?;
        self.request(method, path, Some(body), RequestOptions::default()).await?.json()
    }

    async fn attach(&self, pending: &PendingRequest) -> Option<Credentials> {
        if pending.options.skip_auth {
            return None;
        }
        match self.auth.credentials().await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "Could not read credentials; sending without Authorization");
                None
            }
        }
    }

    async fn dispatch(
        &self,
        pending: &PendingRequest,
        credentials: Option<&Credentials>,
    ) -> Result<ApiResponse, ApiError> {
        let mut builder = self.http.request(pending.method.clone(), pending.url.clone());
        for (name, value) in &pending.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = pending.options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(credentials) = credentials {
            builder = builder.header(AUTHORIZATION, credentials.authorization_header());
        }
        if let Some(body) = &pending.body {
            builder = body.apply(builder)?;
        }

        let response = self.http.send(builder).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read response body: {e}")))?;

        Ok(ApiResponse { status, headers, body: body.to_vec() })
    }
}

impl std::fmt::Debug for AuthenticatedApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedApiClient").field("base_url", &self.base_url).finish()
    }
}
