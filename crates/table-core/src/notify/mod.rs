//! Realtime notifications to the browser-facing servers.
//!
//! Every event goes to one shared channel; the payload names the per-match
//! channel the browser side should forward it to.

use crate::config::Settings;
use crate::error::{Result, TableError};
use crate::models::MatchId;
use crate::proxy::StateListener;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::debug;

/// Pub/sub transport.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, message: &str) -> Result<()>;
}

/// Publishes through a Redis server.
#[derive(Clone)]
pub struct RedisPublisher {
    client: redis::Client,
}

impl RedisPublisher {
    /// Create a publisher for `url`. No connection is made until the first
    /// publish.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| TableError::Config {
            message: format!("invalid message server url {:?}: {}", url, e),
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let failed = |e: redis::RedisError| TableError::Publish {
            channel: channel.to_string(),
            message: e.to_string(),
        };
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(failed)?;
        let receivers: i64 = connection.publish(channel, message).await.map_err(failed)?;
        debug!(channel, receivers, "Published");
        Ok(())
    }
}

/// Announces that a match has a state worth showing its player.
#[derive(Clone)]
pub struct ActionNotifier {
    publisher: Arc<dyn Publisher>,
    realtime_channel: String,
    channel_prefix: String,
}

impl ActionNotifier {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        realtime_channel: impl Into<String>,
        channel_prefix: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            realtime_channel: realtime_channel.into(),
            channel_prefix: channel_prefix.into(),
        }
    }

    pub fn from_settings(publisher: Arc<dyn Publisher>, settings: &Settings) -> Self {
        Self::new(
            publisher,
            settings.realtime_channel.clone(),
            settings.player_action_channel_prefix.clone(),
        )
    }

    /// Publish `{"channel": "<prefix><match id>"}` on the realtime channel.
    pub async fn announce_actionable(&self, match_id: &MatchId) -> Result<()> {
        let payload = serde_json::json!({
            "channel": format!("{}{}", self.channel_prefix, match_id),
        });
        self.publisher
            .publish(&self.realtime_channel, &payload.to_string())
            .await
    }
}

#[async_trait]
impl StateListener for ActionNotifier {
    async fn on_actionable(&self, match_id: &MatchId) -> Result<()> {
        self.announce_actionable(match_id).await
    }
}
