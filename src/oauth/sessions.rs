// src/oauth/sessions.rs
// Pending authorization sessions, keyed by the anti-forgery state token.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Server-side record of an authorization that has been started but whose
/// callback has not yet arrived. Consumed exactly once.
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    pub state_token: String,
    pub channel_id: i32,
    pub client_id: String,
    pub redirect_uri: String,
    pub requested_scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Generate a state token with 256 bits of OS entropy, base64url encoded.
/// Deliberately unrelated to the channel id or the clock.
pub fn generate_state_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// In-process store of pending sessions. Replaces the kind of module-level
/// dict the rest of the app should never see; lifecycle is explicit and the
/// store is injected into the manager.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, AuthorizationSession>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, session: AuthorizationSession) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.state_token.clone(), session);
    }

    /// Look at a pending session without consuming it. Expired sessions are
    /// reported as absent.
    pub async fn peek(&self, state_token: &str) -> Option<AuthorizationSession> {
        let sessions = self.sessions.read().await;
        sessions
            .get(state_token)
            .filter(|s| !self.is_expired(s))
            .cloned()
    }

    /// Remove and return the session for this state token. Returns None when
    /// the token is unknown, already consumed, or past the TTL — the caller
    /// treats all three as an invalid session.
    pub async fn consume(&self, state_token: &str) -> Option<AuthorizationSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.remove(state_token)?;
        if self.is_expired(&session) {
            return None;
        }
        Some(session)
    }

    /// Whether some channel has an authorization waiting on its callback.
    pub async fn pending_for(&self, channel_id: i32) -> bool {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .any(|s| s.channel_id == channel_id && !self.is_expired(s))
    }

    /// Drop abandoned sessions. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| Utc::now() - s.created_at <= self.ttl);
        before - sessions.len()
    }

    fn is_expired(&self, session: &AuthorizationSession) -> bool {
        Utc::now() - session.created_at > self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(state: &str, channel_id: i32, age: Duration) -> AuthorizationSession {
        AuthorizationSession {
            state_token: state.to_string(),
            channel_id,
            client_id: "client-abc".to_string(),
            redirect_uri: "http://localhost:3000/oauth/callback".to_string(),
            requested_scopes: vec!["https://www.googleapis.com/auth/youtube".to_string()],
            created_at: Utc::now() - age,
        }
    }

    #[test]
    fn test_state_tokens_are_long_and_distinct() {
        let a = generate_state_token();
        let b = generate_state_token();
        // 32 bytes -> 43 base64url chars
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let store = SessionStore::new(Duration::hours(1));
        store.insert(session("s1", 7, Duration::zero())).await;

        let first = store.consume("s1").await;
        assert!(first.is_some());
        assert_eq!(first.unwrap().channel_id, 7);

        assert!(store.consume("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_invalid_and_gone() {
        let store = SessionStore::new(Duration::hours(1));
        store.insert(session("old", 1, Duration::hours(2))).await;

        assert!(store.peek("old").await.is_none());
        assert!(store.consume("old").await.is_none());
        // consume removed it even though it was expired
        assert!(store.pending_for(1).await == false);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = SessionStore::new(Duration::hours(1));
        store.insert(session("fresh", 1, Duration::minutes(5))).await;
        store.insert(session("stale", 2, Duration::hours(3))).await;

        assert_eq!(store.sweep().await, 1);
        assert!(store.peek("fresh").await.is_some());
        assert!(store.peek("stale").await.is_none());
    }

    #[tokio::test]
    async fn test_pending_for_channel() {
        let store = SessionStore::new(Duration::hours(1));
        assert!(!store.pending_for(3).await);
        store.insert(session("s3", 3, Duration::zero())).await;
        assert!(store.pending_for(3).await);
        store.consume("s3").await;
        assert!(!store.pending_for(3).await);
    }
}
