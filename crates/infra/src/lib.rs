//! # Sunga Infrastructure
//!
//! I/O side of the Sunga client.
//!
//! This crate contains:
//! - HTTP transport and the authenticated API client
//! - Session orchestration (login, TOTP, logout, profile cache)
//! - Credential store selection (keychain tiers or file)
//! - Layered configuration loading
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements the auth traits defined in `sunga-common`
//! - Depends on `sunga-common` and `sunga-domain`

pub mod api;
pub mod config;
pub mod http;
pub mod observability;
pub mod store;

// Re-export commonly used items
pub use api::{
    ApiError, ApiResponse, AuthenticatedApiClient, HttpAuthEndpoint, LoginOutcome, RequestBody,
    RequestOptions, SessionService,
};
pub use http::HttpClient;
pub use observability::{init_tracing, LogFormat};
pub use store::SessionStore;
