//! Sunga API client
//!
//! Authenticated access to the Sunga medical-records API: attaches the
//! stored bearer token to every request, refreshes it once on a 401 and
//! replays the request, and ends the session when the refresh is rejected.
//!
//! # Layout
//!
//! - [`auth`]: `/login`, `/verify-totp`, `/refresh`, `/logout`, `/me`
//! - [`client`]: [`AuthenticatedApiClient`] and the retry-on-401 pipeline
//! - [`session`]: [`SessionService`], sign-in and sign-out orchestration
//! - [`resources`]: collections, records, OCR, QR and user endpoints
//! - [`errors`]: [`ApiError`] and server message extraction

pub mod auth;
pub mod client;
pub mod errors;
pub mod resources;
pub mod session;

pub use auth::{AccessTokenProvider, HttpAuthEndpoint};
pub use client::{
    ApiResponse, AuthenticatedApiClient, PendingRequest, RequestBody, RequestOptions, UploadPart,
};
pub use errors::{extract_message, ApiError, ApiErrorCategory, SESSION_EXPIRED_MESSAGE};
pub use resources::{
    search_records, unorganized_records, CollectionsApi, OcrApi, QrApi, RecordsApi, UploadFile,
    UsersApi,
};
pub use session::{LoginOutcome, SessionService};
