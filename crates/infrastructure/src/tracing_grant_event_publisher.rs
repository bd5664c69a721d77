use async_trait::async_trait;
use grantwell_application::GrantEventPublisher;
use grantwell_core::AppResult;
use grantwell_domain::GrantEvent;
use tracing::info;

/// Event publisher that writes grant events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingGrantEventPublisher;

#[async_trait]
impl GrantEventPublisher for TracingGrantEventPublisher {
    async fn publish(&self, event: GrantEvent) -> AppResult<()> {
        info!(
            grant_id = event.grant_id.as_str(),
            resource_id = event.resource_id.as_str(),
            grantee_id = event.grantee_id.as_str(),
            action = ?event.action,
            timestamp = %event.timestamp,
            "grant event"
        );
        Ok(())
    }
}
