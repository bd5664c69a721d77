use async_trait::async_trait;

use grantwell_core::AppResult;
use grantwell_domain::GrantEvent;

/// Port for announcing committed grant mutations to an external event bus.
///
/// Delivery is fire-and-forget: callers log failures and never fail the
/// originating operation because of them.
#[async_trait]
pub trait GrantEventPublisher: Send + Sync {
    /// Publishes one grant lifecycle event.
    async fn publish(&self, event: GrantEvent) -> AppResult<()>;
}
