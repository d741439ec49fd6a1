// src/oauth/store.rs
// Credential persistence behind a trait so the manager never touches the
// database directly and tests run against an in-memory map.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::oauth::credential::Credential;
use crate::oauth::AuthError;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, channel_id: i32) -> Result<Option<Credential>, AuthError>;
    async fn put(&self, channel_id: i32, credential: &Credential) -> Result<(), AuthError>;
    async fn delete(&self, channel_id: i32) -> Result<(), AuthError>;
}

/// Postgres-backed store over the `channels` table. Writes are single-row
/// UPDATEs; the row is the unit of atomicity.
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get(&self, channel_id: i32) -> Result<Option<Credential>, AuthError> {
        let row: Option<(
            Option<String>,
            Option<String>,
            Option<chrono::DateTime<chrono::Utc>>,
            Option<String>,
            Option<String>,
            Option<chrono::DateTime<chrono::Utc>>,
            Option<chrono::DateTime<chrono::Utc>>,
        )> = sqlx::query_as(
            "SELECT access_token, refresh_token, token_expiry, granted_scopes,
                    token_type, token_created_at, token_refreshed_at
             FROM channels WHERE id = $1",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((access_token, refresh_token, expires_at, scopes, token_type, created, refreshed)) =
            row
        else {
            return Ok(None);
        };

        let Some(access_token) = access_token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        Ok(Some(Credential {
            access_token,
            refresh_token,
            expires_at,
            granted_scopes: scopes.unwrap_or_default(),
            token_type: token_type.unwrap_or_else(|| "Bearer".to_string()),
            created_at: created.unwrap_or_else(chrono::Utc::now),
            refreshed_at: refreshed,
        }))
    }

    async fn put(&self, channel_id: i32, credential: &Credential) -> Result<(), AuthError> {
        let updated = sqlx::query(
            "UPDATE channels SET
                access_token = $1,
                refresh_token = $2,
                token_expiry = $3,
                granted_scopes = $4,
                token_type = $5,
                token_created_at = $6,
                token_refreshed_at = $7,
                oauth_authorized = TRUE,
                updated_at = NOW()
             WHERE id = $8",
        )
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .bind(&credential.granted_scopes)
        .bind(&credential.token_type)
        .bind(credential.created_at)
        .bind(credential.refreshed_at)
        .bind(channel_id)
        .execute(&self.pool)
        .await?;

        // A vanished channel row must not leave callers believing the
        // credential was persisted.
        if updated.rows_affected() == 0 {
            return Err(AuthError::NotAuthorized(channel_id));
        }

        Ok(())
    }

    async fn delete(&self, channel_id: i32) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE channels SET
                access_token = NULL,
                refresh_token = NULL,
                token_expiry = NULL,
                granted_scopes = NULL,
                token_type = NULL,
                token_created_at = NULL,
                token_refreshed_at = NULL,
                oauth_authorized = FALSE,
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(channel_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory store used by tests and single-shot tools.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<HashMap<i32, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, channel_id: i32) -> Result<Option<Credential>, AuthError> {
        Ok(self.inner.read().await.get(&channel_id).cloned())
    }

    async fn put(&self, channel_id: i32, credential: &Credential) -> Result<(), AuthError> {
        self.inner.write().await.insert(channel_id, credential.clone());
        Ok(())
    }

    async fn delete(&self, channel_id: i32) -> Result<(), AuthError> {
        self.inner.write().await.remove(&channel_id);
        Ok(())
    }
}
