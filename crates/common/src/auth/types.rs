//! Credential and token payload types

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::claims::TokenClaims;

/// Token type used when the server does not send one
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// Reasons a credential triple cannot be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("Server response missing {0}")]
    MissingField(&'static str),
}

/// Stored credential triple
///
/// Either all three fields are present and non-empty or there are no
/// credentials at all; constructors enforce that. Serialized as a single
/// JSON blob so stores replace it atomically.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl Credentials {
    /// Build a credential triple. A missing or blank `token_type` becomes
    /// [`DEFAULT_TOKEN_TYPE`].
    ///
    /// # Errors
    /// Returns `CredentialsError::MissingField` if either token is empty.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_type: Option<String>,
    ) -> Result<Self, CredentialsError> {
        let credentials = Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: normalize_token_type(token_type),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Credentials from a login, TOTP or registration response. Both tokens
    /// are required.
    ///
    /// # Errors
    /// Returns `CredentialsError::MissingField` if either token is absent.
    pub fn from_token_response(response: TokenResponse) -> Result<Self, CredentialsError> {
        let refresh_token =
            response.refresh_token.ok_or(CredentialsError::MissingField("refresh_token"))?;
        Self::new(response.access_token, refresh_token, response.token_type)
    }

    /// Apply a `/refresh` response.
    ///
    /// The access token always changes. The refresh token changes only if
    /// the server issued a new one; otherwise the current one is kept.
    ///
    /// # Errors
    /// Returns `CredentialsError::MissingField` if the response carries an
    /// empty access token.
    pub fn rotate(&self, response: TokenResponse) -> Result<Self, CredentialsError> {
        let refresh_token = response
            .refresh_token
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| self.refresh_token.clone());
        Self::new(response.access_token, refresh_token, response.token_type)
    }

    /// Check the all-fields-present invariant.
    ///
    /// # Errors
    /// Returns `CredentialsError::MissingField` naming the first empty field.
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.access_token.is_empty() {
            return Err(CredentialsError::MissingField("access_token"));
        }
        if self.refresh_token.is_empty() {
            return Err(CredentialsError::MissingField("refresh_token"));
        }
        if self.token_type.is_empty() {
            return Err(CredentialsError::MissingField("token_type"));
        }
        Ok(())
    }

    /// Value for the `Authorization` header: `"<token_type> <access_token>"`.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Claims from the access token payload, if it is a decodable JWT.
    pub fn claims(&self) -> Option<TokenClaims> {
        TokenClaims::decode(&self.access_token).ok()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .finish()
    }
}

fn normalize_token_type(token_type: Option<String>) -> String {
    match token_type {
        Some(t) if !t.trim().is_empty() => t,
        _ => default_token_type(),
    }
}

/// Token response from `/refresh`, `/register` and `/login/verify-totp`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Response from `/login`
///
/// Accounts with TOTP enabled get `require_totp: true` and a `user_id`
/// instead of tokens; the client then calls `/login/verify-totp`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub require_totp: bool,
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl LoginResponse {
    /// The token part of the response, if the server issued an access token.
    pub fn into_tokens(self) -> Option<TokenResponse> {
        let access_token = self.access_token.filter(|token| !token.is_empty())?;
        Some(TokenResponse {
            access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
        })
    }
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_type", &self.token_type)
            .field("require_totp", &self.require_totp)
            .field("user_id", &self.user_id)
            .finish()
    }
}
