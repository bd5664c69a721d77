use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;

use grantwell_core::{AppError, AppResult, CallerIdentity, TransactionContext};
use grantwell_domain::GrantEvent;

use crate::{GrantEventPublisher, LedgerEntry, LedgerStore, LedgerTransaction};

static NEXT_TX: AtomicU64 = AtomicU64::new(1);

pub(crate) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid base time"))
}

pub(crate) fn context_at(subject: &str, timestamp: DateTime<Utc>) -> TransactionContext {
    let caller = CallerIdentity::new(subject).unwrap_or_else(|error| panic!("{error}"));
    let tx_id = format!("tx-{}", NEXT_TX.fetch_add(1, Ordering::Relaxed));
    TransactionContext::new(tx_id, timestamp, caller).unwrap_or_else(|error| panic!("{error}"))
}

type SharedState = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// Ledger fake that buffers writes per transaction without conflict checks.
#[derive(Default)]
pub(crate) struct FakeLedgerStore {
    state: SharedState,
    failing_put_prefix: Option<String>,
    unavailable: bool,
}

impl FakeLedgerStore {
    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_puts(prefix: &str) -> Self {
        Self {
            failing_put_prefix: Some(prefix.to_owned()),
            ..Self::default()
        }
    }

    pub(crate) async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for FakeLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>> {
        if self.unavailable {
            return Err(AppError::StoreUnavailable(
                "fake ledger is offline".to_owned(),
            ));
        }

        Ok(Box::new(FakeLedgerTransaction {
            state: self.state.clone(),
            writes: BTreeMap::new(),
            failing_put_prefix: self.failing_put_prefix.clone(),
        }))
    }
}

struct FakeLedgerTransaction {
    state: SharedState,
    writes: BTreeMap<String, Option<Vec<u8>>>,
    failing_put_prefix: Option<String>,
}

#[async_trait]
impl LedgerTransaction for FakeLedgerTransaction {
    async fn get_state(&mut self, key: &str) -> AppResult<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }

        Ok(self.state.lock().await.get(key).cloned())
    }

    async fn put_state(&mut self, key: &str, value: Vec<u8>) -> AppResult<()> {
        if let Some(prefix) = &self.failing_put_prefix {
            if key.starts_with(prefix.as_str()) {
                return Err(AppError::StoreUnavailable(format!(
                    "fake ledger rejected write to '{key}'"
                )));
            }
        }

        self.writes.insert(key.to_owned(), Some(value));
        Ok(())
    }

    async fn delete_state(&mut self, key: &str) -> AppResult<()> {
        self.writes.insert(key.to_owned(), None);
        Ok(())
    }

    async fn range_query(&mut self, prefix: &str) -> AppResult<Vec<LedgerEntry>> {
        let mut merged: BTreeMap<String, Vec<u8>> = self
            .state
            .lock()
            .await
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, pending) in &self.writes {
            if !key.starts_with(prefix) {
                continue;
            }
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
        let mut state = self.state.lock().await;
        for (key, pending) in std::mem::take(&mut self.writes) {
            match pending {
                Some(value) => {
                    state.insert(key, value);
                }
                None => {
                    state.remove(&key);
                }
            }
        }

        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingEventPublisher {
    pub(crate) events: Mutex<Vec<GrantEvent>>,
}

#[async_trait]
impl GrantEventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: GrantEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) struct FailingEventPublisher;

#[async_trait]
impl GrantEventPublisher for FailingEventPublisher {
    async fn publish(&self, _event: GrantEvent) -> AppResult<()> {
        Err(AppError::StoreUnavailable("event bus offline".to_owned()))
    }
}
