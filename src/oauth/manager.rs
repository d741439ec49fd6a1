// src/oauth/manager.rs
// Credential lifecycle manager: begin authorization, handle the provider
// callback, keep access tokens fresh, revoke. One instance per process,
// shared behind an Arc.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::{ClientCredentials, OAuthConfig};
use crate::models::channel::Channel;
use crate::oauth::credential::Credential;
use crate::oauth::provider::{ChannelIdentity, TokenProvider};
use crate::oauth::sessions::{generate_state_token, AuthorizationSession, SessionStore};
use crate::oauth::store::CredentialStore;
use crate::oauth::AuthError;

/// Outcome of a successful callback. `identity` is best-effort: a failed
/// identity fetch leaves the credential usable and is reported in `warning`.
#[derive(Debug)]
pub struct AuthorizationResult {
    pub channel_id: i32,
    pub credential: Credential,
    pub identity: Option<ChannelIdentity>,
    pub warning: Option<String>,
}

/// Per-channel authorization state, detected lazily at check time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    Unauthorized,
    Pending,
    Authorized,
    Expired,
}

#[derive(Debug, Serialize)]
pub struct ChannelAuthStatus {
    pub state: AuthState,
    pub detail: String,
    pub needs: Vec<&'static str>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct OAuthManager {
    config: OAuthConfig,
    provider: Arc<dyn TokenProvider>,
    store: Arc<dyn CredentialStore>,
    sessions: SessionStore,
    // Last-known-good credentials; mutated only under the channel's lock.
    cache: RwLock<HashMap<i32, Credential>>,
    // Serializes check -> refresh -> persist per channel so concurrent
    // callers never race a refresh-token rotation.
    locks: Mutex<HashMap<i32, Arc<Mutex<()>>>>,
}

impl OAuthManager {
    pub fn new(
        config: OAuthConfig,
        provider: Arc<dyn TokenProvider>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let sessions = SessionStore::new(config.session_ttl);
        Self {
            config,
            provider,
            store,
            sessions,
            cache: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Resolve the OAuth client for a channel: its own pair, or the
    /// environment fallback.
    pub fn resolve_client(&self, channel: &Channel) -> Result<ClientCredentials, AuthError> {
        channel
            .client_credentials()
            .or_else(|| self.config.fallback_client.clone())
            .ok_or_else(|| {
                AuthError::Configuration(format!(
                    "no OAuth client configured for channel {}",
                    channel.id
                ))
            })
    }

    fn credential_is_valid(&self, credential: &Credential) -> bool {
        credential.is_valid(self.config.safety_margin, self.config.assume_non_expiring)
    }

    async fn channel_lock(&self, channel_id: i32) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(channel_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ========================================================================
    // Authorization initiation
    // ========================================================================

    /// Build the provider authorization URL and register the pending
    /// session. Returns `(authorization_url, state_token)`.
    pub async fn begin_authorization(
        &self,
        channel_id: i32,
        client_id: &str,
        redirect_uri: Option<String>,
        scopes: Option<Vec<String>>,
    ) -> Result<(String, String), AuthError> {
        if client_id.is_empty() {
            return Err(AuthError::Configuration(
                "client_id must not be empty".to_string(),
            ));
        }

        let state_token = generate_state_token();
        let redirect_uri = redirect_uri.unwrap_or_else(|| self.config.redirect_uri.clone());
        let requested_scopes = scopes.unwrap_or_else(|| self.config.scopes.clone());

        // Persist the session before handing out the URL, so the callback
        // can never arrive ahead of the session record.
        self.sessions
            .insert(AuthorizationSession {
                state_token: state_token.clone(),
                channel_id,
                client_id: client_id.to_string(),
                redirect_uri: redirect_uri.clone(),
                requested_scopes: requested_scopes.clone(),
                created_at: Utc::now(),
            })
            .await;

        let url = self.provider.authorization_url(
            client_id,
            &redirect_uri,
            &requested_scopes,
            &state_token,
        );

        tracing::info!("Generated authorization URL for channel {}", channel_id);

        Ok((url, state_token))
    }

    /// Non-consuming session lookup, used by the callback route to find the
    /// channel (and its client secret) before running the exchange.
    pub async fn pending_session(&self, state_token: &str) -> Option<AuthorizationSession> {
        self.sessions.peek(state_token).await
    }

    // ========================================================================
    // Callback handling
    // ========================================================================

    /// Exchange the authorization code for tokens and persist the credential.
    ///
    /// The session is consumed up front: a failed exchange still burns the
    /// state token, because authorization codes are single-use and retrying
    /// with the same state would be a replay.
    pub async fn handle_callback(
        &self,
        authorization_code: &str,
        state_token: &str,
        client_secret: &str,
    ) -> Result<AuthorizationResult, AuthError> {
        let session = self
            .sessions
            .consume(state_token)
            .await
            .ok_or(AuthError::InvalidSession)?;

        let channel_id = session.channel_id;
        let lock = self.channel_lock(channel_id).await;
        let _guard = lock.lock().await;

        tracing::info!("Exchanging authorization code for channel {}", channel_id);

        let tokens = self
            .provider
            .exchange_code(
                &session.client_id,
                client_secret,
                authorization_code,
                &session.redirect_uri,
            )
            .await?;

        let access_token = tokens
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingAccessToken)?;

        let now = Utc::now();
        let expires_at = now + Duration::seconds(tokens.expires_in.unwrap_or(3600));

        // Best-effort: the credential is usable even if the profile fetch
        // fails, so report that as a warning rather than failing the flow.
        let (identity, warning) = match self.provider.fetch_identity(&access_token).await {
            Ok(identity) => (Some(identity), None),
            Err(e) => {
                tracing::warn!(
                    "Identity fetch failed after authorization of channel {}: {}",
                    channel_id,
                    e
                );
                (None, Some(e.to_string()))
            }
        };

        let credential = Credential {
            access_token,
            refresh_token: tokens.refresh_token.filter(|t| !t.is_empty()),
            expires_at: Some(expires_at),
            granted_scopes: tokens
                .scope
                .unwrap_or_else(|| session.requested_scopes.join(" ")),
            token_type: tokens.token_type.unwrap_or_else(|| "Bearer".to_string()),
            created_at: now,
            refreshed_at: None,
        };

        self.store.put(channel_id, &credential).await?;
        self.cache.write().await.insert(channel_id, credential.clone());

        tracing::info!("Authorization completed for channel {}", channel_id);

        Ok(AuthorizationResult {
            channel_id,
            credential,
            identity,
            warning,
        })
    }

    // ========================================================================
    // Validity and refresh
    // ========================================================================

    /// Return a usable credential for the channel, refreshing through the
    /// provider when the stored one is inside the safety margin.
    pub async fn ensure_valid(
        &self,
        channel_id: i32,
        client: &ClientCredentials,
    ) -> Result<Credential, AuthError> {
        let lock = self.channel_lock(channel_id).await;
        let _guard = lock.lock().await;

        // Cache first: no storage round trip for the common case.
        if let Some(cached) = self.cache.read().await.get(&channel_id) {
            if self.credential_is_valid(cached) {
                return Ok(cached.clone());
            }
        }

        let stored = self
            .store
            .get(channel_id)
            .await?
            .ok_or(AuthError::NotAuthorized(channel_id))?;

        if self.credential_is_valid(&stored) {
            self.cache.write().await.insert(channel_id, stored.clone());
            return Ok(stored);
        }

        let refresh_token = stored
            .refresh_token
            .clone()
            .ok_or(AuthError::NoRefreshToken)?;

        tracing::info!("Refreshing access token for channel {}", channel_id);

        let tokens = self
            .provider
            .refresh_token(&client.client_id, &client.client_secret, &refresh_token)
            .await?;

        let access_token = tokens
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingAccessToken)?;

        let now = Utc::now();
        let refreshed = Credential {
            access_token,
            // Some providers rotate the refresh token; the old one is then
            // dead and must be replaced, never kept alongside.
            refresh_token: tokens
                .refresh_token
                .filter(|t| !t.is_empty())
                .or(Some(refresh_token)),
            expires_at: Some(now + Duration::seconds(tokens.expires_in.unwrap_or(3600))),
            granted_scopes: tokens.scope.unwrap_or(stored.granted_scopes),
            token_type: tokens.token_type.unwrap_or(stored.token_type),
            created_at: stored.created_at,
            refreshed_at: Some(now),
        };

        self.store.put(channel_id, &refreshed).await?;
        self.cache.write().await.insert(channel_id, refreshed.clone());

        tracing::info!("Access token refreshed for channel {}", channel_id);

        Ok(refreshed)
    }

    /// Run `ensure_valid` and then hit the identity endpoint to confirm the
    /// token actually works against the provider.
    pub async fn test_credentials(
        &self,
        channel_id: i32,
        client: &ClientCredentials,
    ) -> Result<ChannelIdentity, AuthError> {
        let credential = self.ensure_valid(channel_id, client).await?;
        self.provider.fetch_identity(&credential.access_token).await
    }

    // ========================================================================
    // Revocation
    // ========================================================================

    /// Revoke remotely (best-effort) and clear local state. Returns false
    /// when there was nothing to revoke; that is not an error.
    pub async fn revoke(&self, channel_id: i32) -> Result<bool, AuthError> {
        let lock = self.channel_lock(channel_id).await;
        let guard = lock.lock().await;

        let revoked = match self.store.get(channel_id).await? {
            Some(credential) => {
                if let Err(e) = self.provider.revoke_token(&credential.access_token).await {
                    // Remote revoke failing must not block local cleanup.
                    tracing::warn!("Remote revoke failed for channel {}: {}", channel_id, e);
                }

                self.store.delete(channel_id).await?;
                self.cache.write().await.remove(&channel_id);

                tracing::info!("Authorization revoked for channel {}", channel_id);
                true
            }
            None => false,
        };

        drop(guard);
        self.release_channel_lock(channel_id, &lock).await;

        Ok(revoked)
    }

    /// Drop the channel's lock entry when nothing else holds it. The map
    /// would otherwise grow one entry per channel ever touched.
    async fn release_channel_lock(&self, channel_id: i32, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // Two strong references mean only the map and our caller hold it.
        if Arc::strong_count(lock) == 2 {
            locks.remove(&channel_id);
        }
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Detailed authorization status for a channel, including what is
    /// missing before authorization can proceed.
    pub async fn status(&self, channel: &Channel) -> Result<ChannelAuthStatus, AuthError> {
        let client_configured = channel.client_credentials().is_some()
            || self.config.fallback_client.is_some();

        if !client_configured {
            return Ok(ChannelAuthStatus {
                state: AuthState::Unauthorized,
                detail: "OAuth client credentials not configured".to_string(),
                needs: vec!["client_id", "client_secret"],
                expires_at: None,
            });
        }

        let stored = self.store.get(channel.id).await?;

        let Some(credential) = stored else {
            if self.sessions.pending_for(channel.id).await {
                return Ok(ChannelAuthStatus {
                    state: AuthState::Pending,
                    detail: "authorization started, waiting for callback".to_string(),
                    needs: vec![],
                    expires_at: None,
                });
            }
            return Ok(ChannelAuthStatus {
                state: AuthState::Unauthorized,
                detail: "channel not authorized".to_string(),
                needs: vec!["oauth_authorization"],
                expires_at: None,
            });
        };

        if self.credential_is_valid(&credential) {
            return Ok(ChannelAuthStatus {
                state: AuthState::Authorized,
                detail: "credential valid".to_string(),
                needs: vec![],
                expires_at: credential.expires_at,
            });
        }

        let detail = if credential.refresh_token.is_some() {
            "access token expired; refresh available".to_string()
        } else {
            "access token expired and no refresh token; re-authorization required".to_string()
        };

        Ok(ChannelAuthStatus {
            state: AuthState::Expired,
            detail,
            needs: if credential.refresh_token.is_some() {
                vec![]
            } else {
                vec!["oauth_authorization"]
            },
            expires_at: credential.expires_at,
        })
    }

    /// Drop abandoned authorization sessions. Called from the background
    /// sweep task.
    pub async fn sweep_sessions(&self) -> usize {
        let removed = self.sessions.sweep().await;
        if removed > 0 {
            tracing::info!("Cleaned up {} expired OAuth sessions", removed);
        }
        removed
    }
}
