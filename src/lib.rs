// lib.rs - exports the service modules so the binary and tests share them

pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod oauth;

use std::sync::Arc;

use crate::oauth::manager::OAuthManager;

/// Shared application state, passed to handlers via `Extension(Arc<AppState>)`.
pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub oauth: Arc<OAuthManager>,
}
