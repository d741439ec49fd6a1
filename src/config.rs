// src/config.rs
// OAuth provider and runtime configuration, loaded from environment variables.

use chrono::Duration;
use std::time::Duration as StdDuration;

/// Default YouTube scopes requested during authorization.
pub const DEFAULT_SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/youtube.upload",
    "https://www.googleapis.com/auth/youtube",
    "https://www.googleapis.com/auth/youtube.readonly",
    "https://www.googleapis.com/auth/youtube.force-ssl",
];

/// OAuth client credentials (per-channel or the environment fallback pair).
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Provider authorization endpoint (browser redirect target).
    pub auth_uri: String,
    /// Provider token endpoint (code exchange and refresh).
    pub token_uri: String,
    /// Provider revoke endpoint.
    pub revoke_uri: String,
    /// Identity endpoint queried with the fresh access token.
    pub identity_uri: String,

    /// Scopes requested when a caller does not override them.
    pub scopes: Vec<String>,
    /// Callback URL registered with the provider.
    pub redirect_uri: String,

    /// Tokens are treated as expired this long before their literal expiry.
    pub safety_margin: Duration,
    /// Pending authorization sessions older than this are invalid.
    pub session_ttl: Duration,
    /// Whether a credential without an expiry is trusted. Google always
    /// issues expires_in, so a missing expiry normally means the value was
    /// lost, not that the token never expires.
    pub assume_non_expiring: bool,

    /// Fallback OAuth client for channels without their own client_id/secret.
    pub fallback_client: Option<ClientCredentials>,

    /// Timeout for token and identity calls.
    pub http_timeout: StdDuration,
    /// Timeout for the best-effort revoke call.
    pub revoke_timeout: StdDuration,
}

impl OAuthConfig {
    /// Load configuration from the environment, with Google endpoint defaults.
    pub fn from_env() -> Self {
        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let redirect_uri = std::env::var("OAUTH_REDIRECT_URI")
            .unwrap_or_else(|_| format!("{}/oauth/callback", base_url));

        let fallback_client = match (
            std::env::var("GOOGLE_OAUTH_CLIENT_ID").ok(),
            std::env::var("GOOGLE_OAUTH_CLIENT_SECRET").ok(),
        ) {
            (Some(client_id), Some(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                Some(ClientCredentials {
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        };

        Self {
            auth_uri: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            revoke_uri: "https://oauth2.googleapis.com/revoke".to_string(),
            identity_uri: "https://www.googleapis.com/youtube/v3/channels".to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            redirect_uri,
            safety_margin: Duration::seconds(env_i64("OAUTH_SAFETY_MARGIN_SECS", 300)),
            session_ttl: Duration::seconds(env_i64("OAUTH_SESSION_TTL_SECS", 3600)),
            assume_non_expiring: std::env::var("OAUTH_ASSUME_NON_EXPIRING")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            fallback_client,
            http_timeout: StdDuration::from_secs(30),
            revoke_timeout: StdDuration::from_secs(10),
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_i64_fallback() {
        assert_eq!(env_i64("CHANNEL_AUTH_UNSET_VAR", 300), 300);
        std::env::set_var("CHANNEL_AUTH_TEST_MARGIN", "120");
        assert_eq!(env_i64("CHANNEL_AUTH_TEST_MARGIN", 300), 120);
        std::env::set_var("CHANNEL_AUTH_TEST_MARGIN", "not-a-number");
        assert_eq!(env_i64("CHANNEL_AUTH_TEST_MARGIN", 300), 300);
        std::env::remove_var("CHANNEL_AUTH_TEST_MARGIN");
    }
}
