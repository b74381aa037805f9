//! Auth endpoints of the Sunga API
//!
//! [`HttpAuthEndpoint`] wraps the unauthenticated calls (`/login`,
//! `/login/verify-totp`, `/register`, `/refresh`, `/logout`) plus a `/me`
//! call made with explicit credentials during sign-in. It talks to
//! [`HttpClient`] directly, never through the authenticated client, so a
//! rejected refresh can never trigger another refresh.

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use sunga_common::auth::{
    AuthEndpoint, AuthEndpointError, CredentialStore, Credentials, LoginResponse, TokenManager,
    TokenResponse,
};
use sunga_domain::{LoginEncoding, NewAccount};
use tracing::{debug, info, instrument, warn};

use super::errors::ApiError;
use crate::http::{join_url, HttpClient};

/// Source of credentials for the authenticated client
///
/// Implemented by [`TokenManager`]; tests substitute their own.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Credentials to attach to the next request, `None` when signed out.
    async fn credentials(&self) -> Result<Option<Credentials>, ApiError>;

    /// Recover from a 401 received while sending `rejected_access_token`.
    ///
    /// Returns the credentials to retry with. On failure the session has
    /// already been ended.
    async fn recover(&self, rejected_access_token: Option<&str>) -> Result<Credentials, ApiError>;
}

#[async_trait]
impl<E, S> AccessTokenProvider for TokenManager<E, S>
where
    E: AuthEndpoint + 'static,
    S: CredentialStore + 'static,
{
    async fn credentials(&self) -> Result<Option<Credentials>, ApiError> {
        Ok(self.current_credentials().await?)
    }

    async fn recover(&self, rejected_access_token: Option<&str>) -> Result<Credentials, ApiError> {
        Ok(self.recover_from_unauthorized(rejected_access_token).await?)
    }
}

/// HTTP implementation of the auth endpoints
#[derive(Debug, Clone)]
pub struct HttpAuthEndpoint {
    http: HttpClient,
    base_url: String,
    login_encoding: LoginEncoding,
}

impl HttpAuthEndpoint {
    pub fn new(http: HttpClient, base_url: impl Into<String>, login_encoding: LoginEncoding) -> Self {
        Self { http, base_url: base_url.into(), login_encoding }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// `POST /login`.
    ///
    /// The form encoding sends the identifier as `username` (the server
    /// looks the account up by email). The JSON encoding also sends it as
    /// `email` when it looks like one.
    ///
    /// # Errors
    /// `Http` for rejected credentials, `Network` if the server is
    /// unreachable, `Decode` if the body is not a login response.
    #[instrument(skip(self, password), fields(encoding = ?self.login_encoding))]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = join_url(&self.base_url, "/login")?;
        let request = self.http.request(Method::POST, url);
        let request = match self.login_encoding {
            LoginEncoding::Form => request.form(&[("username", identifier), ("password", password)]),
            LoginEncoding::Json => {
                let mut body = json!({ "username": identifier, "password": password });
                if identifier.contains('@') {
                    body["email"] = Value::String(identifier.to_string());
                }
                request.json(&body)
            }
        };

        let response: LoginResponse = self.execute(request).await?;
        debug!(require_totp = response.require_totp, "login answered");
        Ok(response)
    }

    /// `POST /login/verify-totp?user_id=N` with `{totp_code}`.
    ///
    /// # Errors
    /// `Http` for a wrong or expired code.
    #[instrument(skip(self, code))]
    pub async fn verify_totp(&self, user_id: i64, code: &str) -> Result<TokenResponse, ApiError> {
        let url = join_url(&self.base_url, "/login/verify-totp")?;
        let request = self
            .http
            .request(Method::POST, url)
            .query(&[("user_id", user_id)])
            .json(&json!({ "totp_code": code }));
        self.execute(request).await
    }

    /// `POST /register`. The role is always sent as `patient`; other roles
    /// are provisioned server-side.
    ///
    /// # Errors
    /// `Http` if the account is rejected (duplicate email, validation).
    #[instrument(skip(self, account), fields(username = %account.username))]
    pub async fn register(&self, account: &NewAccount) -> Result<TokenResponse, ApiError> {
        let mut account = account.clone();
        account.role = sunga_domain::UserRole::Patient;
        self.post_json("/register", &account).await
    }

    /// `POST /logout` with `{refresh_token}`. The response body is ignored.
    ///
    /// # Errors
    /// `Http` or `Network` if the server did not acknowledge.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let url = join_url(&self.base_url, "/logout")?;
        let request =
            self.http.request(Method::POST, url).json(&json!({ "refresh_token": refresh_token }));
        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }
        info!("Server acknowledged logout");
        Ok(())
    }

    /// `GET /me` with explicit credentials, used before they are stored.
    ///
    /// # Errors
    /// `Http` if the token is rejected.
    #[instrument(skip_all)]
    pub async fn me(&self, credentials: &Credentials) -> Result<Value, ApiError> {
        let url = join_url(&self.base_url, "/me")?;
        let request = self
            .http
            .request(Method::GET, url)
            .header(header::AUTHORIZATION, credentials.authorization_header());
        self.execute(request).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = join_url(&self.base_url, path)?;
        self.execute(self.http.request(Method::POST, url).json(body)).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.http.send(request).await?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::from_response(status, &body));
        }

        serde_json::from_slice(&body)
            .map_err(|e| ApiError::Decode(format!("unexpected auth response: {e}")))
    }
}

#[async_trait]
impl AuthEndpoint for HttpAuthEndpoint {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthEndpointError> {
        let response: TokenResponse = self
            .post_json("/refresh", &json!({ "refresh_token": refresh_token }))
            .await
            .map_err(|e| {
                warn!(error = %e, "refresh request failed");
                to_endpoint_error(e)
            })?;

        if response.access_token.is_empty() {
            return Err(AuthEndpointError::InvalidResponse("empty access_token".into()));
        }
        Ok(response)
    }
}

fn to_endpoint_error(err: ApiError) -> AuthEndpointError {
    match err {
        ApiError::Http { status, message, .. } => AuthEndpointError::Rejected { status, message },
        ApiError::Decode(m) => AuthEndpointError::InvalidResponse(m),
        other => AuthEndpointError::Network(other.user_message().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use sunga_domain::UserRole;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn endpoint(server: &MockServer, encoding: LoginEncoding) -> HttpAuthEndpoint {
        HttpAuthEndpoint::new(HttpClient::new().unwrap(), server.uri(), encoding)
    }

    fn tokens(access: &str, refresh: &str) -> Value {
        json!({ "access_token": access, "refresh_token": refresh, "token_type": "bearer" })
    }

    #[tokio::test]
    async fn test_login_form_encoding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("username=ada%40example.com"))
            .and(body_string_contains("password=hunter2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokens("T1", "R1")))
            .expect(1)
            .mount(&server)
            .await;

        let response =
            endpoint(&server, LoginEncoding::Form).login("ada@example.com", "hunter2").await.unwrap();
        let tokens = response.into_tokens().unwrap();
        assert_eq!(tokens.access_token, "T1");
        assert_eq!(tokens.token_type.as_deref(), Some("bearer"));
    }

    #[tokio::test]
    async fn test_login_json_encoding_adds_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_json(json!({
                "email": "ada@example.com",
                "username": "ada@example.com",
                "password": "hunter2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokens("T1", "R1")))
            .expect(1)
            .mount(&server)
            .await;

        endpoint(&server, LoginEncoding::Json).login("ada@example.com", "hunter2").await.unwrap();
    }

    #[tokio::test]
    async fn test_login_totp_challenge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"require_totp": true, "user_id": 42})),
            )
            .mount(&server)
            .await;

        let response = endpoint(&server, LoginEncoding::Form).login("ada", "pw").await.unwrap();
        assert!(response.require_totp);
        assert_eq!(response.user_id, Some(42));
        assert!(response.into_tokens().is_none());
    }

    #[tokio::test]
    async fn test_login_rejection_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"detail": "Invalid Credentials"})),
            )
            .mount(&server)
            .await;

        let err = endpoint(&server, LoginEncoding::Form).login("ada", "bad").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.user_message(), "Invalid Credentials");
    }

    #[tokio::test]
    async fn test_verify_totp_sends_user_id_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/verify-totp"))
            .and(query_param("user_id", "42"))
            .and(body_json(json!({"totp_code": "123456"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokens("T1", "R1")))
            .expect(1)
            .mount(&server)
            .await;

        let response =
            endpoint(&server, LoginEncoding::Form).verify_totp(42, "123456").await.unwrap();
        assert_eq!(response.refresh_token.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_register_forces_patient_role() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .and(body_string_contains(r#""role":"patient""#))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"access_token": "T1", "refresh_token": "R1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let account = NewAccount {
            username: "ada".into(),
            password: "hunter22".into(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone_number: "5550100".into(),
            blood_group: "O+".into(),
            role: UserRole::Admin,
            aadhar: None,
            allergies: None,
            doctor_name: None,
            visit_date: None,
        };
        let response = endpoint(&server, LoginEncoding::Form).register(&account).await.unwrap();
        assert_eq!(response.token_type, None);
    }

    #[tokio::test]
    async fn test_refresh_maps_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .and(body_json(json!({"refresh_token": "R1"})))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid refresh token"})),
            )
            .mount(&server)
            .await;

        let err = endpoint(&server, LoginEncoding::Form).refresh("R1").await.unwrap_err();
        assert_eq!(
            err,
            AuthEndpointError::Rejected { status: 401, message: "Invalid refresh token".into() }
        );
    }

    #[tokio::test]
    async fn test_refresh_without_access_token_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "bearer"})))
            .mount(&server)
            .await;

        let err = endpoint(&server, LoginEncoding::Form).refresh("R1").await.unwrap_err();
        assert!(matches!(err, AuthEndpointError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_me_uses_given_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "bearer T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let creds = Credentials::new("T1", "R1", Some("bearer".into())).unwrap();
        let me = endpoint(&server, LoginEncoding::Form).me(&creds).await.unwrap();
        assert_eq!(me["id"], 1);
    }

    #[tokio::test]
    async fn test_logout_ignores_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .and(body_json(json!({"refresh_token": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        endpoint(&server, LoginEncoding::Form).logout("R1").await.unwrap();
    }
}
