//! Testing utilities
//!
//! In-memory doubles for the platform traits:
//! - **[`MockKeychainProvider`]**: `SecretStore` backed by a map, with an
//!   unavailability switch for exercising fallback paths
//! - **[`MockAuthEndpoint`]**: scripted `/refresh` results with a call
//!   counter and optional latency
//! - **[`InMemoryCredentialStore`]**: `CredentialStore` with write-failure
//!   injection
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use sunga_common::auth::{Credentials, TokenManager};
//! use sunga_common::testing::{InMemoryCredentialStore, MockAuthEndpoint};
//!
//! # tokio_test_block(async {
//! let store = InMemoryCredentialStore::with_credentials(
//!     Credentials::new("T1", "R1", None).unwrap(),
//! );
//! let endpoint = Arc::new(MockAuthEndpoint::succeeding("T2", None));
//! let tokens = TokenManager::new(endpoint.clone(), Arc::new(store));
//!
//! let rotated = tokens.recover_from_unauthorized(Some("T1")).await.unwrap();
//! assert_eq!(rotated.access_token, "T2");
//! assert_eq!(endpoint.refresh_calls(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod mocks;

pub use mocks::{InMemoryCredentialStore, MockAuthEndpoint, MockKeychainProvider};
