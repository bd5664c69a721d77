use std::collections::BTreeMap;

use async_trait::async_trait;
use grantwell_application::{LedgerEntry, LedgerStore, LedgerTransaction};
use grantwell_core::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Transaction};

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// PostgreSQL ledger backed by the `ledger_state` table.
///
/// Each ledger transaction is one serializable database transaction. Writes
/// are buffered and flushed at commit; PostgreSQL rejects a commit whose
/// reads were invalidated by a concurrent transaction, which surfaces as
/// [`AppError::Conflict`].
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a ledger over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| map_sqlx_error("failed to begin ledger transaction", error))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_sqlx_error("failed to set ledger isolation level", error))?;

        Ok(Box::new(PostgresLedgerTransaction {
            transaction: Some(transaction),
            writes: BTreeMap::new(),
        }))
    }
}

struct PostgresLedgerTransaction {
    transaction: Option<Transaction<'static, Postgres>>,
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl PostgresLedgerTransaction {
    fn open(&mut self) -> AppResult<&mut Transaction<'static, Postgres>> {
        self.transaction.as_mut().ok_or_else(|| {
            AppError::Internal("ledger transaction is already committed".to_owned())
        })
    }
}

#[async_trait]
impl LedgerTransaction for PostgresLedgerTransaction {
    async fn get_state(&mut self, key: &str) -> AppResult<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }

        let transaction = self.open()?;
        sqlx::query_scalar::<_, Vec<u8>>(
            r#"
            SELECT value
            FROM ledger_state
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&mut **transaction)
        .await
        .map_err(|error| map_sqlx_error(&format!("failed to read ledger key '{key}'"), error))
    }

    async fn put_state(&mut self, key: &str, value: Vec<u8>) -> AppResult<()> {
        self.open()?;
        self.writes.insert(key.to_owned(), Some(value));
        Ok(())
    }

    async fn delete_state(&mut self, key: &str) -> AppResult<()> {
        self.open()?;
        self.writes.insert(key.to_owned(), None);
        Ok(())
    }

    async fn range_query(&mut self, prefix: &str) -> AppResult<Vec<LedgerEntry>> {
        let transaction = self.open()?;
        let rows = sqlx::query_as::<_, (String, Vec<u8>)>(
            r#"
            SELECT key, value
            FROM ledger_state
            WHERE starts_with(key, $1)
            ORDER BY key
            "#,
        )
        .bind(prefix)
        .fetch_all(&mut **transaction)
        .await
        .map_err(|error| map_sqlx_error(&format!("failed to scan ledger prefix '{prefix}'"), error))?;

        let mut merged: BTreeMap<String, Vec<u8>> = rows.into_iter().collect();
        for (key, pending) in self.writes.iter().filter(|(key, _)| key.starts_with(prefix)) {
            match pending {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|(key, value)| LedgerEntry { key, value })
            .collect())
    }

    async fn commit(&mut self) -> AppResult<()> {
        let mut transaction = self.transaction.take().ok_or_else(|| {
            AppError::Internal("ledger transaction is already committed".to_owned())
        })?;

        for (key, pending) in std::mem::take(&mut self.writes) {
            match pending {
                Some(value) => {
                    sqlx::query(
                        r#"
                        INSERT INTO ledger_state (key, value, version)
                        VALUES ($1, $2, 1)
                        ON CONFLICT (key) DO UPDATE
                        SET value = EXCLUDED.value,
                            version = ledger_state.version + 1,
                            updated_at = now()
                        "#,
                    )
                    .bind(key.as_str())
                    .bind(value)
                    .execute(&mut *transaction)
                    .await
                    .map_err(|error| {
                        map_sqlx_error(&format!("failed to write ledger key '{key}'"), error)
                    })?;
                }
                None => {
                    sqlx::query("DELETE FROM ledger_state WHERE key = $1")
                        .bind(key.as_str())
                        .execute(&mut *transaction)
                        .await
                        .map_err(|error| {
                            map_sqlx_error(&format!("failed to delete ledger key '{key}'"), error)
                        })?;
                }
            }
        }

        transaction
            .commit()
            .await
            .map_err(|error| map_sqlx_error("failed to commit ledger transaction", error))
    }
}

fn map_sqlx_error(context: &str, error: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        if matches!(
            database_error.code().as_deref(),
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
        ) {
            return AppError::Conflict(format!("{context}: {error}"));
        }
    }

    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::StoreUnavailable(format!("{context}: {error}")),
        _ => AppError::Internal(format!("{context}: {error}")),
    }
}

#[cfg(test)]
mod tests;
