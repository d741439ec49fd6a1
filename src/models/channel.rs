use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A managed YouTube channel row, including its OAuth client and the live
/// credential columns. Token fields stay server-side; API responses use
/// `ChannelResponse`.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Channel {
    pub id: i32,
    pub channel_name: String,
    pub description: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<chrono::DateTime<chrono::Utc>>,
    pub granted_scopes: Option<String>,
    pub token_type: Option<String>,
    pub token_created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub token_refreshed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub oauth_authorized: bool,
    pub youtube_channel_id: Option<String>,
    pub channel_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Channel {
    /// OAuth client configured for this channel, if complete.
    pub fn client_credentials(&self) -> Option<crate::config::ClientCredentials> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(crate::config::ClientCredentials {
                    client_id: id.clone(),
                    client_secret: secret.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Public view of a channel. Never carries tokens or the client secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelResponse {
    pub id: i32,
    pub channel_name: String,
    pub description: Option<String>,
    pub oauth_authorized: bool,
    pub youtube_channel_id: Option<String>,
    pub channel_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
    pub token_expiry: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Channel> for ChannelResponse {
    fn from(channel: Channel) -> Self {
        Self {
            id: channel.id,
            channel_name: channel.channel_name,
            description: channel.description,
            oauth_authorized: channel.oauth_authorized,
            youtube_channel_id: channel.youtube_channel_id,
            channel_url: channel.channel_url,
            thumbnail_url: channel.thumbnail_url,
            subscriber_count: channel.subscriber_count,
            video_count: channel.video_count,
            token_expiry: channel.token_expiry,
            created_at: channel.created_at,
        }
    }
}
