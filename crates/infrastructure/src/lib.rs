//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_ledger_store;
mod postgres_ledger_store;
mod redis_grant_event_publisher;
mod tracing_grant_event_publisher;

pub use in_memory_ledger_store::InMemoryLedgerStore;
pub use postgres_ledger_store::PostgresLedgerStore;
pub use redis_grant_event_publisher::RedisGrantEventPublisher;
pub use tracing_grant_event_publisher::TracingGrantEventPublisher;
