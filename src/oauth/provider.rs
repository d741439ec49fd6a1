// src/oauth/provider.rs
// Outbound HTTP to the OAuth provider (Google). Everything network-facing
// sits behind the TokenProvider trait so the lifecycle manager can be
// exercised against a stub.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::OAuthConfig;
use crate::oauth::AuthError;

/// Token endpoint response. Google returns the error fields in the same
/// JSON body on rejection, so one struct covers both outcomes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Basic identity summary for the authorized account's channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelIdentity {
    pub channel_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub channel_url: String,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Build the authorization URL the account owner visits in a browser.
    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
        state: &str,
    ) -> String;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AuthError>;

    /// Mint a new access token from a refresh token.
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, AuthError>;

    /// Revoke a token remotely. Best-effort; the caller clears local state
    /// regardless of the outcome.
    async fn revoke_token(&self, access_token: &str) -> Result<(), AuthError>;

    /// Fetch the channel profile for the authorized account.
    async fn fetch_identity(&self, access_token: &str) -> Result<ChannelIdentity, AuthError>;
}

// ============================================================================
// Google implementation
// ============================================================================

pub struct GoogleProvider {
    client: Client,
    auth_uri: String,
    token_uri: String,
    revoke_uri: String,
    identity_uri: String,
    revoke_timeout: Duration,
}

impl GoogleProvider {
    pub fn new(config: &OAuthConfig) -> Self {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            auth_uri: config.auth_uri.clone(),
            token_uri: config.token_uri.clone(),
            revoke_uri: config.revoke_uri.clone(),
            identity_uri: config.identity_uri.clone(),
            revoke_timeout: config.revoke_timeout,
        }
    }

    /// POST to the token endpoint and surface rejection bodies verbatim.
    async fn token_request(
        &self,
        params: &[(&str, &str)],
    ) -> Result<Result<TokenResponse, (String, String)>, AuthError> {
        let response = self
            .client
            .post(&self.token_uri)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() || parsed.error.is_some() {
            let error = parsed
                .error
                .unwrap_or_else(|| format!("http_{}", status.as_u16()));
            let description = parsed.error_description.unwrap_or(body);
            return Ok(Err((error, description)));
        }

        Ok(Ok(parsed))
    }
}

#[async_trait]
impl TokenProvider for GoogleProvider {
    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
        state: &str,
    ) -> String {
        let scope_string = scopes.join(" ");

        // access_type=offline + prompt=consent so Google issues a refresh
        // token even on repeat authorizations.
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&response_type=code&state={}&access_type=offline&prompt=consent&include_granted_scopes=true",
            self.auth_uri,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope_string),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AuthError> {
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        match self.token_request(&params).await? {
            Ok(tokens) => Ok(tokens),
            Err((error, description)) => Err(AuthError::TokenExchange { error, description }),
        }
    }

    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenResponse, AuthError> {
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        match self.token_request(&params).await? {
            Ok(tokens) => Ok(tokens),
            Err((error, description)) => Err(AuthError::Refresh { error, description }),
        }
    }

    async fn revoke_token(&self, access_token: &str) -> Result<(), AuthError> {
        // Google returns 200 even for tokens that were already invalid.
        let response = self
            .client
            .post(&self.revoke_uri)
            .timeout(self.revoke_timeout)
            .query(&[("token", access_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Token revoke returned {}: {}", status, body);
        }

        Ok(())
    }

    async fn fetch_identity(&self, access_token: &str) -> Result<ChannelIdentity, AuthError> {
        let response = self
            .client
            .get(&self.identity_uri)
            .query(&[("part", "id,snippet,statistics"), ("mine", "true")])
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::Identity(error_text));
        }

        let channel_response: ChannelListResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Identity(e.to_string()))?;

        let item = channel_response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| {
                AuthError::Identity("no YouTube channel found for this account".to_string())
            })?;

        let thumbnail_url = item
            .snippet
            .thumbnails
            .and_then(|t| t.high.or(t.medium).or(t.default))
            .map(|t| t.url);

        let subscriber_count = item
            .statistics
            .as_ref()
            .and_then(|s| s.subscriber_count.as_ref())
            .and_then(|c| c.parse().ok());

        let video_count = item
            .statistics
            .as_ref()
            .and_then(|s| s.video_count.as_ref())
            .and_then(|c| c.parse().ok());

        Ok(ChannelIdentity {
            channel_url: format!("https://www.youtube.com/channel/{}", item.id),
            channel_id: item.id,
            title: item.snippet.title,
            description: Some(item.snippet.description),
            thumbnail_url,
            subscriber_count,
            video_count,
        })
    }
}

// ============================================================================
// YouTube channels endpoint response structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
    statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
    description: String,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    default: Option<ThumbnailInfo>,
    medium: Option<ThumbnailInfo>,
    high: Option<ThumbnailInfo>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChannelStatistics {
    #[serde(rename = "subscriberCount")]
    subscriber_count: Option<String>,
    #[serde(rename = "videoCount")]
    video_count: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleProvider {
        let mut config = OAuthConfig::from_env();
        config.auth_uri = "https://accounts.google.com/o/oauth2/v2/auth".to_string();
        GoogleProvider::new(&config)
    }

    #[test]
    fn test_authorization_url_contains_required_params() {
        let scopes = vec![
            "https://www.googleapis.com/auth/youtube.upload".to_string(),
            "https://www.googleapis.com/auth/youtube".to_string(),
        ];
        let url = provider().authorization_url(
            "client-abc",
            "http://localhost:3000/oauth/callback",
            &scopes,
            "state-xyz",
        );

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-abc"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=state-xyz"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("include_granted_scopes=true"));
        // redirect and scopes are percent-encoded
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Foauth%2Fcallback"));
        assert!(url.contains(
            "scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fyoutube.upload%20https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fyoutube"
        ));
    }

    #[test]
    fn test_token_response_parses_error_body() {
        let body = r#"{"error":"invalid_grant","error_description":"Bad code"}"#;
        let parsed: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("invalid_grant"));
        assert_eq!(parsed.error_description.as_deref(), Some("Bad code"));
        assert!(parsed.access_token.is_none());
    }
}
