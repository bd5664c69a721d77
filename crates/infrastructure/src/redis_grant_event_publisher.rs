//! Redis pub/sub grant event publisher.

use async_trait::async_trait;
use grantwell_application::GrantEventPublisher;
use grantwell_core::{AppError, AppResult};
use grantwell_domain::GrantEvent;
use redis::AsyncCommands;

/// Publishes grant events as JSON on a Redis channel.
#[derive(Clone)]
pub struct RedisGrantEventPublisher {
    client: redis::Client,
    channel: String,
}

impl RedisGrantEventPublisher {
    /// Creates a publisher for a configured Redis client and channel.
    #[must_use]
    pub fn new(client: redis::Client, channel: impl Into<String>) -> Self {
        Self {
            client,
            channel: channel.into(),
        }
    }

    fn encode_event(event: &GrantEvent) -> AppResult<String> {
        serde_json::to_string(event).map_err(|error| {
            AppError::Internal(format!("failed to encode grant event payload: {error}"))
        })
    }
}

#[async_trait]
impl GrantEventPublisher for RedisGrantEventPublisher {
    async fn publish(&self, event: GrantEvent) -> AppResult<()> {
        let payload = Self::encode_event(&event)?;
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!("failed to connect to redis: {error}"))
            })?;

        let _receivers: i64 = connection
            .publish(self.channel.as_str(), payload)
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!(
                    "failed to publish grant event '{}' on '{}': {error}",
                    event.grant_id, self.channel
                ))
            })?;

        Ok(())
    }
}
