use std::sync::Arc;

use grantwell_application::{AccessControlService, GrantEventPublisher, LedgerStore};
use grantwell_core::AppError;
use grantwell_infrastructure::{
    InMemoryLedgerStore, PostgresLedgerStore, RedisGrantEventPublisher,
    TracingGrantEventPublisher,
};
use tracing::{info, warn};

use crate::api_config::{ApiConfig, EventPublisherConfig, LedgerBackendConfig};
use crate::state::AppState;

use super::database::connect_and_migrate;
use super::redis::build_redis_client;

pub async fn build_app_state(config: &ApiConfig) -> Result<AppState, AppError> {
    let ledger = build_ledger(&config.ledger_backend).await?;
    let event_publisher = build_event_publisher(&config.event_publisher)?;

    Ok(AppState {
        access_control_service: AccessControlService::new(
            ledger,
            event_publisher,
            config.access_policy,
        ),
        ledger_backend: config.ledger_backend.name(),
    })
}

async fn build_ledger(config: &LedgerBackendConfig) -> Result<Arc<dyn LedgerStore>, AppError> {
    match config {
        LedgerBackendConfig::Memory => {
            warn!("using in-memory ledger; state is lost on restart");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
        LedgerBackendConfig::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url).await?;
            info!("postgres ledger ready");
            Ok(Arc::new(PostgresLedgerStore::new(pool)))
        }
    }
}

fn build_event_publisher(
    config: &EventPublisherConfig,
) -> Result<Arc<dyn GrantEventPublisher>, AppError> {
    match config {
        EventPublisherConfig::Log => Ok(Arc::new(TracingGrantEventPublisher)),
        EventPublisherConfig::Redis { redis_url, channel } => {
            let client = build_redis_client(redis_url)?;
            info!(channel = channel.as_str(), "publishing grant events to redis");
            Ok(Arc::new(RedisGrantEventPublisher::new(
                client,
                channel.as_str(),
            )))
        }
    }
}
