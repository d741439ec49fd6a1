// OAuth lifecycle handlers
// Browser-facing start/callback pages plus the JSON management API.

use crate::models::channel::Channel;
use crate::oauth::AuthError;
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{Html, Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn oauth_routes() -> Router {
    Router::new()
        // Browser-facing flow
        .route("/oauth/start/:channel_id", get(start_authorization))
        .route("/oauth/callback", get(oauth_callback))
        // Management API
        .route("/api/oauth/authorize/:channel_id", post(authorize_channel))
        .route("/api/oauth/status/:channel_id", get(authorization_status))
        .route("/api/oauth/test/:channel_id", post(test_channel_credentials))
        .route("/api/oauth/refresh/:channel_id", post(refresh_channel_token))
        .route("/api/oauth/revoke/:channel_id", post(revoke_channel))
}

#[derive(Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Minimal HTML escaping for values interpolated into the callback pages.
/// Query parameters and provider-supplied text must never reach the browser
/// as markup.
fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn consent_error_page(error: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html><html><head><title>Authorization Failed</title></head>
        <body><h1>❌ Authorization Failed</h1><p>The provider reported: {}</p>
        <p>You can close this window and try again.</p></body></html>"#,
        html_escape(error)
    ))
}

/// Map a lifecycle error onto an HTTP response. Token values never appear in
/// the body; the machine-readable `error` code is what clients branch on.
fn auth_error_response(err: AuthError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        AuthError::Configuration(_) | AuthError::InvalidSession => StatusCode::BAD_REQUEST,
        AuthError::NoRefreshToken | AuthError::NotAuthorized(_) => StatusCode::CONFLICT,
        AuthError::TokenExchange { .. }
        | AuthError::Refresh { .. }
        | AuthError::MissingAccessToken
        | AuthError::Identity(_)
        | AuthError::Network(_) => StatusCode::BAD_GATEWAY,
        AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(json!({
            "success": false,
            "error": err.code(),
            "message": err.to_string()
        })),
    )
}

async fn load_channel(
    pool: &sqlx::PgPool,
    channel_id: i32,
) -> Result<Channel, (StatusCode, Json<Value>)> {
    let channel: Option<Channel> = sqlx::query_as("SELECT * FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load channel {}: {}", channel_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Database error"
                })),
            )
        })?;

    channel.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": format!("Channel {} not found", channel_id)
            })),
        )
    })
}

// ============================================================================
// Browser-facing flow
// ============================================================================

/// Start the OAuth flow in a browser: builds the authorization URL and
/// redirects the account owner straight to the consent screen.
pub async fn start_authorization(
    Path(channel_id): Path<i32>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Redirect, (StatusCode, Json<Value>)> {
    let channel = load_channel(&state.db_pool, channel_id).await?;
    let client = state
        .oauth
        .resolve_client(&channel)
        .map_err(auth_error_response)?;

    let (url, _) = state
        .oauth
        .begin_authorization(channel.id, &client.client_id, None, None)
        .await
        .map_err(auth_error_response)?;

    Ok(Redirect::temporary(&url))
}

/// Handle the redirect back from the consent screen. Renders a plain HTML
/// page the account owner can close; the admin UI polls the status API.
pub async fn oauth_callback(
    Query(params): Query<OAuthCallbackQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    if let Some(error) = params.error {
        tracing::warn!("OAuth consent denied or failed: {}", error);
        return Ok(consent_error_page(&error));
    }

    let code = params.code.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Html("<h1>Missing authorization code</h1>".to_string()),
        )
    })?;

    let state_token = params.state.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Html("<h1>Missing state parameter</h1>".to_string()),
        )
    })?;

    // Look up the pending session (without consuming it) to find the channel
    // whose client secret signs the exchange.
    let session = state.oauth.pending_session(&state_token).await.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Html(
                r#"<!DOCTYPE html><html><head><title>Session Expired</title></head>
                <body><h1>⚠️ Authorization Session Invalid</h1>
                <p>This authorization link was already used or has expired.</p>
                <p>Please start the authorization again.</p></body></html>"#
                    .to_string(),
            ),
        )
    })?;

    let channel = load_channel(&state.db_pool, session.channel_id)
        .await
        .map_err(|(status, _)| {
            (
                status,
                Html("<h1>Channel for this authorization no longer exists</h1>".to_string()),
            )
        })?;

    let client = state.oauth.resolve_client(&channel).map_err(|e| {
        tracing::error!("OAuth client misconfigured for channel {}: {}", channel.id, e);
        (
            StatusCode::BAD_REQUEST,
            Html(format!("<h1>OAuth client misconfigured ({})</h1>", e.code())),
        )
    })?;

    let result = state
        .oauth
        .handle_callback(&code, &state_token, &client.client_secret)
        .await
        .map_err(|e| {
            tracing::error!(
                "Authorization callback failed for channel {}: {}",
                channel.id,
                e
            );
            // Generic message only; the verbatim provider detail stays in
            // the log line above.
            (
                StatusCode::BAD_GATEWAY,
                Html(format!(
                    r#"<!DOCTYPE html><html><head><title>Authorization Failed</title></head>
                    <body><h1>❌ Authorization Failed</h1>
                    <p>Could not complete authorization ({}).</p>
                    <p>Please start the authorization again.</p></body></html>"#,
                    e.code()
                )),
            )
        })?;

    // Persist the identity snapshot when the profile fetch worked.
    if let Some(identity) = &result.identity {
        if let Err(e) = sqlx::query(
            "UPDATE channels SET
                youtube_channel_id = $1,
                channel_url = $2,
                thumbnail_url = $3,
                subscriber_count = $4,
                video_count = $5,
                updated_at = NOW()
             WHERE id = $6",
        )
        .bind(&identity.channel_id)
        .bind(&identity.channel_url)
        .bind(&identity.thumbnail_url)
        .bind(identity.subscriber_count)
        .bind(identity.video_count)
        .bind(channel.id)
        .execute(&state.db_pool)
        .await
        {
            tracing::warn!("Failed to save identity snapshot for channel {}: {}", channel.id, e);
        }
    }

    let identity_line = match &result.identity {
        Some(identity) => format!(
            "<p>Connected YouTube channel: <strong>{}</strong></p>",
            html_escape(&identity.title)
        ),
        None => String::new(),
    };
    let warning_line = if result.warning.is_some() {
        "<p>⚠️ Channel details could not be fetched; the credential was stored.</p>".to_string()
    } else {
        String::new()
    };

    Ok(Html(format!(
        r#"<!DOCTYPE html><html><head><title>Authorization Complete</title></head>
        <body><h1>✅ Authorization Complete</h1>
        <p><strong>{}</strong> is now authorized.</p>
        {}{}
        <p>You can close this window.</p></body></html>"#,
        html_escape(&channel.channel_name),
        identity_line,
        warning_line
    )))
}

// ============================================================================
// Management API
// ============================================================================

/// Return the authorization URL as JSON for an admin UI to open.
pub async fn authorize_channel(
    Path(channel_id): Path<i32>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let channel = load_channel(&state.db_pool, channel_id).await?;
    let client = state
        .oauth
        .resolve_client(&channel)
        .map_err(auth_error_response)?;

    let (url, state_token) = state
        .oauth
        .begin_authorization(channel.id, &client.client_id, None, None)
        .await
        .map_err(auth_error_response)?;

    Ok(Json(json!({
        "success": true,
        "channel_id": channel.id,
        "authorization_url": url,
        "state": state_token
    })))
}

pub async fn authorization_status(
    Path(channel_id): Path<i32>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let channel = load_channel(&state.db_pool, channel_id).await?;
    let status = state
        .oauth
        .status(&channel)
        .await
        .map_err(auth_error_response)?;

    Ok(Json(json!({
        "success": true,
        "channel_id": channel.id,
        "channel_name": channel.channel_name,
        "status": status
    })))
}

/// Check and, if needed, refresh the channel's credential, then probe the
/// provider's identity endpoint with it.
pub async fn test_channel_credentials(
    Path(channel_id): Path<i32>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let channel = load_channel(&state.db_pool, channel_id).await?;
    let client = state
        .oauth
        .resolve_client(&channel)
        .map_err(auth_error_response)?;

    let identity = state
        .oauth
        .test_credentials(channel.id, &client)
        .await
        .map_err(auth_error_response)?;

    Ok(Json(json!({
        "success": true,
        "channel_id": channel.id,
        "identity": identity
    })))
}

/// Force a validity check. Refreshes through the provider only when the
/// stored token is inside the safety margin.
pub async fn refresh_channel_token(
    Path(channel_id): Path<i32>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let channel = load_channel(&state.db_pool, channel_id).await?;
    let client = state
        .oauth
        .resolve_client(&channel)
        .map_err(auth_error_response)?;

    let credential = state
        .oauth
        .ensure_valid(channel.id, &client)
        .await
        .map_err(auth_error_response)?;

    Ok(Json(json!({
        "success": true,
        "channel_id": channel.id,
        "expires_at": credential.expires_at,
        "refreshed_at": credential.refreshed_at,
        "granted_scopes": credential.granted_scopes
    })))
}

pub async fn revoke_channel(
    Path(channel_id): Path<i32>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let channel = load_channel(&state.db_pool, channel_id).await?;
    let revoked = state
        .oauth
        .revoke(channel.id)
        .await
        .map_err(auth_error_response)?;

    Ok(Json(json!({
        "success": true,
        "channel_id": channel.id,
        "revoked": revoked,
        "message": if revoked {
            "Authorization revoked"
        } else {
            "Channel had no stored credential"
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape_neutralizes_markup() {
        let escaped = html_escape("<img src=x onerror=alert(1)>&\"'");
        assert_eq!(escaped, "&lt;img src=x onerror=alert(1)&gt;&amp;&quot;&#39;");
    }

    #[test]
    fn test_consent_error_page_escapes_query_value() {
        // The error parameter arrives straight from the query string and
        // must never be rendered as markup.
        let Html(page) = consent_error_page("<script>alert(1)</script>");
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }
}
