//! Sign-in, sign-out and the cached user profile
//!
//! [`SessionService`] ties the auth endpoints, the token manager and the
//! authenticated client together. It is the entry point applications use;
//! resource wrappers hang off [`SessionService::client`].

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use sunga_common::auth::{
    AuthEvent, CredentialStore, Credentials, TokenClaims, TokenManager, TokenResponse,
};
use sunga_domain::{AccountUpdate, ClientConfig, NewAccount, UserProfile};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use super::auth::HttpAuthEndpoint;
use super::client::AuthenticatedApiClient;
use super::errors::ApiError;
use crate::http::HttpClient;
use crate::store::SessionStore;

/// Result of `login`
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Credentials and profile are stored.
    Authenticated(UserProfile),
    /// The account has TOTP enabled; call
    /// [`SessionService::verify_totp`] with this `user_id`.
    TotpRequired { user_id: i64 },
}

/// Session lifecycle for one API base URL and one credential store
pub struct SessionService<S: CredentialStore + 'static = SessionStore> {
    endpoint: Arc<HttpAuthEndpoint>,
    tokens: Arc<TokenManager<HttpAuthEndpoint, S>>,
    client: AuthenticatedApiClient,
}

impl SessionService<SessionStore> {
    /// Wire a session from configuration.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let http = HttpClient::builder()
            .timeout(config.api.timeout())
            .user_agent(config.api.user_agent.clone())
            .build()?;
        let endpoint =
            HttpAuthEndpoint::new(http, config.api.base_url.clone(), config.auth.login_encoding);
        let store = Arc::new(SessionStore::from_config(&config.storage));
        Ok(Self::new(endpoint, store))
    }
}

impl<S: CredentialStore + 'static> SessionService<S> {
    pub fn new(endpoint: HttpAuthEndpoint, store: Arc<S>) -> Self {
        let endpoint = Arc::new(endpoint);
        let tokens = Arc::new(TokenManager::new(endpoint.clone(), store));
        let client = AuthenticatedApiClient::new(
            endpoint.http().clone(),
            endpoint.base_url().to_string(),
            tokens.clone(),
        );
        Self { endpoint, tokens, client }
    }

    /// Client for the business endpoints, sharing this session's
    /// credentials.
    pub fn client(&self) -> &AuthenticatedApiClient {
        &self.client
    }

    pub fn tokens(&self) -> &Arc<TokenManager<HttpAuthEndpoint, S>> {
        &self.tokens
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tokens.subscribe()
    }

    /// Sign in with an email or username and a password.
    ///
    /// Nothing is stored when the server asks for a TOTP code.
    ///
    /// # Errors
    /// - `Http` if the server rejects the credentials
    /// - `Decode` if the response carries neither tokens nor a TOTP
    ///   challenge, or the profile is unreadable
    /// - `Storage` if the credentials cannot be persisted
    #[instrument(skip(self, password))]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let response = self.endpoint.login(identifier, password).await?;

        if response.require_totp {
            let user_id = response
                .user_id
                .ok_or_else(|| ApiError::Decode("TOTP challenge without user_id".into()))?;
            info!(user_id, "TOTP verification required");
            return Ok(LoginOutcome::TotpRequired { user_id });
        }

        let tokens = response
            .into_tokens()
            .ok_or_else(|| ApiError::Decode("login response missing access_token".into()))?;
        self.establish(tokens).await.map(LoginOutcome::Authenticated)
    }

    /// Complete a TOTP-protected sign-in.
    ///
    /// # Errors
    /// As [`Self::login`]; `Http` for a wrong code.
    #[instrument(skip(self, code))]
    pub async fn verify_totp(&self, user_id: i64, code: &str) -> Result<UserProfile, ApiError> {
        let tokens = self.endpoint.verify_totp(user_id, code).await?;
        self.establish(tokens).await
    }

    /// Create a patient account and sign in to it.
    ///
    /// # Errors
    /// As [`Self::login`]; `Http` if the account is rejected.
    #[instrument(skip(self, account), fields(username = %account.username))]
    pub async fn register(&self, account: &NewAccount) -> Result<UserProfile, ApiError> {
        let tokens = self.endpoint.register(account).await?;
        self.establish(tokens).await
    }

    /// Sign out. The server is told on a best-effort basis; local
    /// credentials and profile are cleared regardless and `SignedOut` is
    /// broadcast.
    ///
    /// # Errors
    /// Returns `ApiError::Storage` only if the local store could not be
    /// cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        match self.tokens.current_credentials().await {
            Ok(Some(credentials)) => {
                if let Err(e) = self.endpoint.logout(&credentials.refresh_token).await {
                    warn!(error = %e, "Server logout failed; clearing local session anyway");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not read credentials for server logout"),
        }
        self.tokens.sign_out().await?;
        Ok(())
    }

    /// Fetch `/me` and refresh the cached snapshot.
    ///
    /// # Errors
    /// As [`AuthenticatedApiClient::request`], plus `Decode` for an
    /// unreadable profile.
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let raw: Value = self.client.get_json("/me").await?;
        let profile = decode_profile(&raw)?;
        if let Err(e) = self.tokens.store().save_profile(&raw).await {
            warn!(error = %e, "Failed to cache user profile");
        }
        Ok(profile)
    }

    /// Last cached profile, without touching the network. An unreadable
    /// snapshot counts as no snapshot.
    ///
    /// # Errors
    /// Returns `ApiError::Storage` if the store cannot be read.
    pub async fn cached_user(&self) -> Result<Option<UserProfile>, ApiError> {
        let raw = self.tokens.store().load_profile().await.map_err(storage_error)?;
        Ok(raw.and_then(|raw| match decode_profile(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cached profile");
                None
            }
        }))
    }

    /// Cold start: `None` when signed out. Otherwise the freshest profile
    /// available: `/me` if reachable, else the cached snapshot.
    ///
    /// # Errors
    /// Propagates the `/me` failure only when there is no cached snapshot
    /// to fall back to. An ended session is reported as `Ok(None)`.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<UserProfile>, ApiError> {
        if !self.tokens.is_authenticated().await {
            return Ok(None);
        }
        let cached = self.cached_user().await?;

        match self.current_user().await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(e) if e.is_auth() => {
                info!("Stored session is no longer valid");
                Ok(None)
            }
            Err(e) => match cached {
                Some(profile) => {
                    warn!(error = %e, "Could not refresh profile; using cached copy");
                    Ok(Some(profile))
                }
                None => Err(e),
            },
        }
    }

    /// `PUT /user` and cache the updated profile.
    ///
    /// # Errors
    /// As [`Self::current_user`].
    pub async fn update_profile(&self, update: &AccountUpdate) -> Result<UserProfile, ApiError> {
        let raw = self.client.users().update(update).await?;
        let profile = decode_profile(&raw)?;
        if let Err(e) = self.tokens.store().save_profile(&raw).await {
            warn!(error = %e, "Failed to cache user profile");
        }
        Ok(profile)
    }

    /// `DELETE /user`, then clear the local session.
    ///
    /// # Errors
    /// Returns the server error if the account was not deleted; the local
    /// session is kept in that case.
    #[instrument(skip(self))]
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.client.users().delete().await?;
        info!("Account deleted");
        self.tokens.sign_out().await?;
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated().await
    }

    /// Rotate the access token now instead of waiting for a 401.
    ///
    /// Returns the claims of the new access token, if it carries any.
    ///
    /// # Errors
    /// Returns `ApiError::Auth` when signed out or the server refuses the
    /// refresh token; the local session has been ended in both cases.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Option<TokenClaims>, ApiError> {
        let rotated = self.tokens.refresh_tokens().await?;
        info!("Access token refreshed");
        Ok(rotated.claims())
    }

    /// Unverified claims of the current access token.
    pub async fn claims(&self) -> Option<TokenClaims> {
        self.tokens.current_credentials().await.ok().flatten().and_then(|c| c.claims())
    }

    /// # Errors
    /// Returns `ApiError::Storage` if the preference cannot be written.
    pub async fn set_remember_me(&self, remember: bool) -> Result<(), ApiError> {
        self.tokens.store().set_remember_me(remember).await.map_err(storage_error)
    }

    /// # Errors
    /// Returns `ApiError::Storage` if the preference cannot be read.
    pub async fn remember_me(&self) -> Result<bool, ApiError> {
        self.tokens.store().remember_me().await.map_err(storage_error)
    }

    async fn establish(&self, tokens: TokenResponse) -> Result<UserProfile, ApiError> {
        let credentials =
            Credentials::from_token_response(tokens).map_err(|e| ApiError::Decode(e.to_string()))?;
        let raw = self.endpoint.me(&credentials).await?;
        let profile = decode_profile(&raw)?;

        self.tokens.sign_in(&credentials, &raw).await?;
        info!(user_id = profile.id, role = %profile.role, "Signed in");
        Ok(profile)
    }
}

fn decode_profile(raw: &Value) -> Result<UserProfile, ApiError> {
    UserProfile::deserialize(raw).map_err(|e| ApiError::Decode(format!("unexpected profile: {e}")))
}

fn storage_error(err: sunga_common::storage::StorageError) -> ApiError {
    ApiError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sunga_common::testing::InMemoryCredentialStore;
    use sunga_domain::{LoginEncoding, UserRole};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn profile_json() -> Value {
        json!({
            "id": 12,
            "username": "ada",
            "email": "ada@example.com",
            "first_name": "Ada",
            "role": "patient",
            "totp_enabled": false
        })
    }

    async fn service(
        server: &MockServer,
        store: Arc<InMemoryCredentialStore>,
    ) -> SessionService<InMemoryCredentialStore> {
        let endpoint =
            HttpAuthEndpoint::new(HttpClient::new().unwrap(), server.uri(), LoginEncoding::Form);
        SessionService::new(endpoint, store)
    }

    async fn mount_me(server: &MockServer, token: &str) {
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", format!("bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_login_stores_credentials_and_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"access_token": "T1", "refresh_token": "R1", "token_type": "bearer"}),
            ))
            .mount(&server)
            .await;
        mount_me(&server, "T1").await;

        let store = Arc::new(InMemoryCredentialStore::new());
        let session = service(&server, store.clone()).await;
        let mut events = session.subscribe();

        let outcome = session.login("ada@example.com", "pw").await.unwrap();
        let LoginOutcome::Authenticated(profile) = outcome else {
            panic!("expected authenticated outcome");
        };
        assert_eq!(profile.id, 12);
        assert_eq!(profile.role, UserRole::Patient);

        assert_eq!(store.credentials(), Some(Credentials::new("T1", "R1", Some("bearer".into())).unwrap()));
        assert_eq!(store.profile(), Some(profile_json()));
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn);
        assert_eq!(session.cached_user().await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn test_login_with_totp_stores_nothing_until_verified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"require_totp": true, "user_id": 12})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login/verify-totp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"access_token": "T1", "refresh_token": "R1", "token_type": "bearer"}),
            ))
            .mount(&server)
            .await;
        mount_me(&server, "T1").await;

        let store = Arc::new(InMemoryCredentialStore::new());
        let session = service(&server, store.clone()).await;

        let outcome = session.login("ada@example.com", "pw").await.unwrap();
        assert_eq!(outcome, LoginOutcome::TotpRequired { user_id: 12 });
        assert_eq!(store.credentials(), None);

        let profile = session.verify_totp(12, "123456").await.unwrap();
        assert_eq!(profile.username, "ada");
        assert!(session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_login_without_refresh_token_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "T1", "token_type": "bearer"})),
            )
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryCredentialStore::new());
        let session = service(&server, store.clone()).await;

        assert!(matches!(session.login("ada", "pw").await, Err(ApiError::Decode(_))));
        assert_eq!(store.credentials(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryCredentialStore::with_credentials(
            Credentials::new("T1", "R1", None).unwrap(),
        ));
        let session = service(&server, store.clone()).await;
        let mut events = session.subscribe();

        session.logout().await.unwrap();

        assert_eq!(store.credentials(), None);
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
    }

    #[tokio::test]
    async fn test_restore_falls_back_to_cached_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryCredentialStore::with_credentials(
            Credentials::new("T1", "R1", None).unwrap(),
        ));
        store.save_profile(&profile_json()).await.unwrap();
        let session = service(&server, store.clone()).await;

        let restored = session.restore().await.unwrap().unwrap();
        assert_eq!(restored.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_restore_signed_out_makes_no_request() {
        let server = MockServer::start().await;
        let session = service(&server, Arc::new(InMemoryCredentialStore::new())).await;

        assert_eq!(session.restore().await.unwrap(), None);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_with_dead_session_reports_signed_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryCredentialStore::with_credentials(
            Credentials::new("T1", "R1", None).unwrap(),
        ));
        store.save_profile(&profile_json()).await.unwrap();
        let session = service(&server, store.clone()).await;

        assert_eq!(session.restore().await.unwrap(), None);
        assert_eq!(store.profile(), None);
    }

    #[tokio::test]
    async fn test_delete_account_signs_out() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryCredentialStore::with_credentials(
            Credentials::new("T1", "R1", None).unwrap(),
        ));
        let session = service(&server, store.clone()).await;

        session.delete_account().await.unwrap();
        assert_eq!(store.credentials(), None);
    }

    #[tokio::test]
    async fn test_refresh_rotates_access_token_on_demand() {
        let server = MockServer::start().await;
        let access = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJ1c2VyX2lkIjoxMiwicm9sZSI6InBhdGllbnQiLCJleHAiOjQxMDI0NDQ4MDB9.sig";
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": access})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryCredentialStore::with_credentials(
            Credentials::new("T1", "R1", None).unwrap(),
        ));
        let session = service(&server, store.clone()).await;

        let claims = session.refresh().await.unwrap().unwrap();
        assert_eq!(claims.user_id, Some(12));
        assert_eq!(claims.exp, Some(4_102_444_800));
        assert_eq!(store.credentials(), Some(Credentials::new(access, "R1", None).unwrap()));
    }

    #[tokio::test]
    async fn test_refresh_signed_out_is_an_auth_error() {
        let server = MockServer::start().await;
        let session = service(&server, Arc::new(InMemoryCredentialStore::new())).await;

        let err = session.refresh().await.unwrap_err();
        assert!(err.is_auth());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remember_me_round_trips_through_store() {
        let server = MockServer::start().await;
        let session = service(&server, Arc::new(InMemoryCredentialStore::new())).await;

        assert!(!session.remember_me().await.unwrap());
        session.set_remember_me(true).await.unwrap();
        assert!(session.remember_me().await.unwrap());
    }
}
