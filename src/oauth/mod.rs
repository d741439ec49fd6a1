// src/oauth/mod.rs
//! OAuth 2.0 credential lifecycle for connected YouTube channels:
//! authorization URL generation, callback handling, validity checks,
//! refresh, and revocation.

pub mod credential;
pub mod manager;
pub mod provider;
pub mod sessions;
pub mod store;

use thiserror::Error;

/// Everything that can go wrong in the credential lifecycle. Provider error
/// bodies are carried verbatim so logs keep the diagnostics even when the
/// user-facing message is generic.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OAuth client configuration incomplete: {0}")]
    Configuration(String),

    #[error("invalid or expired OAuth state token")]
    InvalidSession,

    #[error("token exchange rejected: {error}: {description}")]
    TokenExchange { error: String, description: String },

    #[error("no access token in provider response")]
    MissingAccessToken,

    #[error("token refresh rejected: {error}: {description}")]
    Refresh { error: String, description: String },

    #[error("credential has no refresh token; re-authorization required")]
    NoRefreshToken,

    #[error("channel {0} has no stored credential")]
    NotAuthorized(i32),

    #[error("identity fetch failed: {0}")]
    Identity(String),

    #[error("network error talking to provider: {0}")]
    Network(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl AuthError {
    /// Machine-readable code included in API error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::InvalidSession => "invalid_session",
            Self::TokenExchange { .. } => "token_exchange_error",
            Self::MissingAccessToken => "missing_access_token",
            Self::Refresh { .. } => "refresh_error",
            Self::NoRefreshToken => "no_refresh_token",
            Self::NotAuthorized(_) => "not_authorized",
            Self::Identity(_) => "identity_error",
            Self::Network(_) => "network_error",
            Self::Store(_) => "store_error",
        }
    }
}
