// Channel registry handlers
// CRUD over the channels table. Responses use ChannelResponse so tokens and
// client secrets never leave the server.

use crate::models::channel::{Channel, ChannelResponse};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn channel_routes() -> Router {
    Router::new()
        .route("/api/channels", get(list_channels).post(create_channel))
        .route("/api/channels/:id", get(get_channel))
        .route("/api/channels/:id/client", put(set_client_credentials))
}

#[derive(Deserialize)]
pub struct CreateChannelRequest {
    pub channel_name: String,
    pub description: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Deserialize)]
pub struct SetClientRequest {
    pub client_id: String,
    pub client_secret: String,
}

fn db_error(e: sqlx::Error) -> (StatusCode, Json<Value>) {
    tracing::error!("Database error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "message": "Database error"
        })),
    )
}

pub async fn list_channels(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let channels: Vec<Channel> = sqlx::query_as("SELECT * FROM channels ORDER BY id")
        .fetch_all(&state.db_pool)
        .await
        .map_err(db_error)?;

    let channels: Vec<ChannelResponse> = channels.into_iter().map(Into::into).collect();

    Ok(Json(json!({
        "success": true,
        "count": channels.len(),
        "channels": channels
    })))
}

pub async fn get_channel(
    Path(channel_id): Path<i32>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let channel: Option<Channel> = sqlx::query_as("SELECT * FROM channels WHERE id = $1")
        .bind(channel_id)
        .fetch_optional(&state.db_pool)
        .await
        .map_err(db_error)?;

    let channel = channel.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": format!("Channel {} not found", channel_id)
            })),
        )
    })?;

    Ok(Json(json!({
        "success": true,
        "channel": ChannelResponse::from(channel)
    })))
}

pub async fn create_channel(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if req.channel_name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "channel_name must not be empty"
            })),
        ));
    }

    let channel: Channel = sqlx::query_as(
        "INSERT INTO channels (channel_name, description, client_id, client_secret)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(req.channel_name.trim())
    .bind(&req.description)
    .bind(&req.client_id)
    .bind(&req.client_secret)
    .fetch_one(&state.db_pool)
    .await
    .map_err(db_error)?;

    tracing::info!("Created channel {} ({})", channel.id, channel.channel_name);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "channel": ChannelResponse::from(channel)
        })),
    ))
}

/// Set or replace the channel's own OAuth client pair. Stored server-side
/// only; never echoed back in responses.
pub async fn set_client_credentials(
    Path(channel_id): Path<i32>,
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<SetClientRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if req.client_id.is_empty() || req.client_secret.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "client_id and client_secret must not be empty"
            })),
        ));
    }

    let updated = sqlx::query(
        "UPDATE channels SET client_id = $1, client_secret = $2, updated_at = NOW()
         WHERE id = $3",
    )
    .bind(&req.client_id)
    .bind(&req.client_secret)
    .bind(channel_id)
    .execute(&state.db_pool)
    .await
    .map_err(db_error)?;

    if updated.rows_affected() == 0 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": format!("Channel {} not found", channel_id)
            })),
        ));
    }

    tracing::info!("Updated OAuth client for channel {}", channel_id);

    Ok(Json(json!({
        "success": true,
        "channel_id": channel_id,
        "message": "OAuth client credentials updated"
    })))
}
