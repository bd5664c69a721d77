use grantwell_application::LedgerStore;
use grantwell_core::AppError;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresLedgerStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres ledger tests: {error}");
    }

    Some(pool)
}

fn unique_prefix() -> String {
    format!("test_{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn committed_writes_are_visible_and_scannable() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ledger = PostgresLedgerStore::new(pool);
    let prefix = unique_prefix();

    let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
    for suffix in ["b", "a", "c"] {
        let key = format!("{prefix}~{suffix}");
        assert!(tx.put_state(key.as_str(), suffix.as_bytes().to_vec()).await.is_ok());
    }
    let pending = tx
        .get_state(format!("{prefix}~a").as_str())
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(pending.as_deref(), Some(b"a".as_slice()));
    assert!(tx.commit().await.is_ok());

    let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
    assert!(tx.delete_state(format!("{prefix}~b").as_str()).await.is_ok());
    let keys: Vec<String> = tx
        .range_query(format!("{prefix}~").as_str())
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .into_iter()
        .map(|entry| entry.key)
        .collect();
    assert_eq!(keys, [format!("{prefix}~a"), format!("{prefix}~c")]);
}

#[tokio::test]
async fn uncommitted_transaction_is_discarded() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ledger = PostgresLedgerStore::new(pool);
    let key = format!("{}~a", unique_prefix());

    {
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        assert!(tx.put_state(key.as_str(), b"value".to_vec()).await.is_ok());
    }

    let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
    let value = tx
        .get_state(key.as_str())
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert!(value.is_none());
}

#[tokio::test]
async fn concurrent_read_modify_write_is_a_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ledger = PostgresLedgerStore::new(pool);
    let key = format!("{}~counter", unique_prefix());

    let mut seed = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
    assert!(seed.put_state(key.as_str(), b"0".to_vec()).await.is_ok());
    assert!(seed.commit().await.is_ok());

    let mut first = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
    let mut second = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
    assert!(first.get_state(key.as_str()).await.is_ok());
    assert!(second.get_state(key.as_str()).await.is_ok());
    assert!(first.put_state(key.as_str(), b"1".to_vec()).await.is_ok());
    assert!(second.put_state(key.as_str(), b"2".to_vec()).await.is_ok());

    assert!(first.commit().await.is_ok());
    let result = second.commit().await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}
