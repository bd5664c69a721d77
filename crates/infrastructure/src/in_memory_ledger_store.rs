use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use grantwell_application::{LedgerEntry, LedgerStore, LedgerTransaction};
use grantwell_core::{AppError, AppResult};
use tokio::sync::RwLock;

/// In-memory ledger with optimistic concurrency control.
///
/// Every committed write stamps its key with a new version; deletions leave
/// a versioned tombstone so that later commits can detect that an absent key
/// or a scanned range changed underneath them.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    version: u64,
    entries: BTreeMap<String, VersionedValue>,
}

#[derive(Debug, Clone)]
struct VersionedValue {
    version: u64,
    value: Option<Vec<u8>>,
}

impl LedgerState {
    fn version_of(&self, key: &str) -> u64 {
        self.entries.get(key).map_or(0, |entry| entry.version)
    }

    fn scan<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a VersionedValue)> + 'a {
        self.entries
            .range(prefix.to_owned()..)
            .take_while(move |(key, _)| key.starts_with(prefix))
    }
}

impl InMemoryLedgerStore {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live keys.
    pub async fn len(&self) -> usize {
        self.state
            .read()
            .await
            .entries
            .values()
            .filter(|entry| entry.value.is_some())
            .count()
    }

    /// Returns whether no live key is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>> {
        Ok(Box::new(InMemoryLedgerTransaction {
            state: self.state.clone(),
            reads: BTreeMap::new(),
            ranges: Vec::new(),
            writes: BTreeMap::new(),
            finished: false,
        }))
    }
}

struct InMemoryLedgerTransaction {
    state: Arc<RwLock<LedgerState>>,
    reads: BTreeMap<String, u64>,
    ranges: Vec<(String, u64)>,
    writes: BTreeMap<String, Option<Vec<u8>>>,
    finished: bool,
}

impl InMemoryLedgerTransaction {
    fn ensure_open(&self) -> AppResult<()> {
        if self.finished {
            return Err(AppError::Internal(
                "ledger transaction is already committed".to_owned(),
            ));
        }

        Ok(())
    }

    fn validate(&self, state: &LedgerState) -> AppResult<()> {
        if let Some((key, _)) = self
            .reads
            .iter()
            .find(|(key, seen)| state.version_of(key) != **seen)
        {
            return Err(AppError::Conflict(format!(
                "key '{key}' changed since it was read"
            )));
        }

        for (prefix, snapshot) in &self.ranges {
            if state
                .scan(prefix.as_str())
                .any(|(_, entry)| entry.version > *snapshot)
            {
                return Err(AppError::Conflict(format!(
                    "range '{prefix}' changed since it was scanned"
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryLedgerTransaction {
    async fn get_state(&mut self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }

        let state = self.state.read().await;
        let entry = state.entries.get(key);
        self.reads
            .entry(key.to_owned())
            .or_insert_with(|| entry.map_or(0, |entry| entry.version));

        Ok(entry.and_then(|entry| entry.value.clone()))
    }

    async fn put_state(&mut self, key: &str, value: Vec<u8>) -> AppResult<()> {
        self.ensure_open()?;
        self.writes.insert(key.to_owned(), Some(value));
        Ok(())
    }

    async fn delete_state(&mut self, key: &str) -> AppResult<()> {
        self.ensure_open()?;
        self.writes.insert(key.to_owned(), None);
        Ok(())
    }

    async fn range_query(&mut self, prefix: &str) -> AppResult<Vec<LedgerEntry>> {
        self.ensure_open()?;
        let state = self.state.read().await;
        self.ranges.push((prefix.to_owned(), state.version));

        let mut merged: BTreeMap<String, Vec<u8>> = state
            .scan(prefix)
            .filter_map(|(key, entry)| entry.value.clone().map(|value| (key.clone(), value)))
            .collect();
        drop(state);

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
        self.ensure_open()?;
        let mut state = self.state.write().await;
        self.validate(&state)?;

        state.version += 1;
        let version = state.version;
        for (key, value) in std::mem::take(&mut self.writes) {
            state.entries.insert(key, VersionedValue { version, value });
        }

        self.finished = true;
        Ok(())
    }
}
