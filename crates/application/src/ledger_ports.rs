use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use grantwell_core::{AppError, AppResult};
use grantwell_domain::{KEY_SEPARATOR, validate_identifier};

/// One key/value pair returned by a range query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Full composite key.
    pub key: String,
    /// Stored value bytes.
    pub value: Vec<u8>,
}

/// Ordered key-value store offering transaction-scoped atomicity.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a transaction for one top-level operation.
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>>;
}

/// Transaction over the ledger state.
///
/// Reads observe the transaction's own writes. Nothing becomes visible to
/// other transactions until `commit` succeeds, and a transaction dropped
/// without committing leaves no trace. Commit fails with
/// [`AppError::Conflict`] when state read by the transaction was changed by a
/// concurrently committed transaction.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Reads one key.
    async fn get_state(&mut self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Writes one key.
    async fn put_state(&mut self, key: &str, value: Vec<u8>) -> AppResult<()>;

    /// Deletes one key; deleting an absent key is a no-op.
    async fn delete_state(&mut self, key: &str) -> AppResult<()>;

    /// Returns every entry whose key starts with the prefix, ordered by key.
    async fn range_query(&mut self, prefix: &str) -> AppResult<Vec<LedgerEntry>>;

    /// Atomically applies all writes.
    async fn commit(&mut self) -> AppResult<()>;
}

/// Builds a full composite key `prefix~c1~c2...`.
pub fn composite_key(prefix: &str, components: &[&str]) -> AppResult<String> {
    let mut key = String::from(prefix);
    for component in components {
        validate_identifier("key component", component)?;
        key.push(KEY_SEPARATOR);
        key.push_str(component);
    }

    Ok(key)
}

/// Builds a range-query prefix `prefix~c1~...~` that only matches whole components.
pub fn composite_key_prefix(prefix: &str, components: &[&str]) -> AppResult<String> {
    let mut key = composite_key(prefix, components)?;
    key.push(KEY_SEPARATOR);
    Ok(key)
}

/// Splits a composite key into its prefix and components.
#[must_use]
pub fn split_composite_key(key: &str) -> Vec<&str> {
    key.split(KEY_SEPARATOR).collect()
}

pub(crate) fn encode_state<T: Serialize>(key: &str, value: &T) -> AppResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|error| {
        AppError::Internal(format!("failed to encode ledger value for '{key}': {error}"))
    })
}

pub(crate) fn decode_state<T: DeserializeOwned>(key: &str, value: &[u8]) -> AppResult<T> {
    serde_json::from_slice(value).map_err(|error| {
        AppError::Internal(format!("failed to decode ledger value for '{key}': {error}"))
    })
}
