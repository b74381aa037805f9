//! Session credentials for the Sunga API
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   TokenManager   │  attach header, single-flight refresh, end session
//! └────────┬─────────┘
//!          │
//!          ├──► AuthEndpoint      (POST /refresh, implemented over HTTP in infra)
//!          ├──► CredentialStore   (where the triple and profile persist)
//!          │         │
//!          │         ├──► TieredCredentialStore  (keychain, then session file)
//!          │         └──► FileCredentialStore    (session file only)
//!          │
//!          └──► broadcast::Sender<AuthEvent>     (SignedIn / SessionExpired / ...)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use sunga_common::auth::{
//!     AuthEndpoint, AuthEndpointError, AuthEvent, TieredCredentialStore, TokenManager,
//!     TokenResponse,
//! };
//!
//! struct Backend;
//!
//! #[async_trait]
//! impl AuthEndpoint for Backend {
//!     async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, AuthEndpointError> {
//!         Err(AuthEndpointError::Network("offline".into()))
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = TieredCredentialStore::with_keychain("com.projectsunga.tokens", "/tmp/session.json");
//! let tokens = TokenManager::new(Arc::new(Backend), Arc::new(store));
//! let mut events = tokens.subscribe();
//!
//! if let Some(header) = tokens.authorization_header().await? {
//!     // attach `header` to the outgoing request ...
//!     # let _ = header;
//! }
//!
//! if let Ok(AuthEvent::SessionExpired { reason }) = events.try_recv() {
//!     eprintln!("signed out: {reason}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod claims;
pub mod events;
mod keychain;
pub mod store;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use claims::{ClaimsError, TokenClaims};
pub use events::AuthEvent;
pub use keychain::SessionSecrets;
pub use store::{FileCredentialStore, StorageTier, TieredCredentialStore};
pub use token_manager::{TokenManager, TokenManagerError};
pub use traits::{AuthEndpoint, AuthEndpointError, CredentialStore};
pub use types::{Credentials, CredentialsError, LoginResponse, TokenResponse, DEFAULT_TOKEN_TYPE};
