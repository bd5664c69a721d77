use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, warn};

use grantwell_core::{AppError, AppResult, TransactionContext};
use grantwell_domain::{AuditAction, AuditEntry, ensure_storable_timestamp};

use crate::ledger_ports::{
    LedgerTransaction, composite_key, composite_key_prefix, decode_state, encode_state,
    split_composite_key,
};

const AUDIT_PREFIX: &str = "audit";
const RESOURCE_INDEX_PREFIX: &str = "audit_resource";
const TIME_INDEX_PREFIX: &str = "audit_time";
const MAX_ID_ATTEMPTS: u32 = 64;

/// Audit event payload supplied by operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Recorded action.
    pub action: AuditAction,
    /// Resource the event concerns.
    pub resource_id: String,
    /// Principal affected by the operation.
    pub target_id: Option<String>,
    /// Grant involved.
    pub grant_id: Option<String>,
    /// Outcome details.
    pub metadata: BTreeMap<String, String>,
}

impl AuditRecord {
    /// Creates a record with no target, grant or metadata.
    #[must_use]
    pub fn new(action: AuditAction, resource_id: impl Into<String>) -> Self {
        Self {
            action,
            resource_id: resource_id.into(),
            target_id: None,
            grant_id: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the affected principal.
    #[must_use]
    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Sets the grant involved.
    #[must_use]
    pub fn with_grant(mut self, grant_id: Option<String>) -> Self {
        self.grant_id = grant_id;
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}

/// Append-only audit trail with by-resource and by-time indices.
///
/// Recording never fails the surrounding operation. Write failures are
/// logged and counted so operators can alert on lost entries.
#[derive(Debug, Clone, Default)]
pub struct AuditRecorder {
    failures: Arc<AtomicU64>,
}

impl AuditRecorder {
    /// Appends an entry inside the operation's transaction.
    ///
    /// Returns the audit id, or `None` when the entry could not be written.
    pub async fn record(
        &self,
        tx: &mut dyn LedgerTransaction,
        ctx: &TransactionContext,
        record: AuditRecord,
    ) -> Option<String> {
        let action = record.action;
        let resource_id = record.resource_id.clone();

        match self.write_entry(tx, ctx, record).await {
            Ok(audit_id) => Some(audit_id),
            Err(error) => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                error!(
                    error = %error,
                    action = action.as_str(),
                    resource_id = resource_id.as_str(),
                    tx_id = ctx.tx_id(),
                    failures,
                    "failed to record audit entry"
                );
                None
            }
        }
    }

    /// Returns the number of audit entries lost since startup.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Lists the newest entries for one resource, newest first.
    pub async fn list_for_resource(
        &self,
        tx: &mut dyn LedgerTransaction,
        resource_id: &str,
        limit: usize,
    ) -> AppResult<Vec<AuditEntry>> {
        let prefix = composite_key_prefix(RESOURCE_INDEX_PREFIX, &[resource_id])?;
        let index = tx.range_query(prefix.as_str()).await?;

        let audit_ids: Vec<String> = index
            .iter()
            .rev()
            .filter_map(|entry| split_composite_key(entry.key.as_str()).last().map(|id| (*id).to_owned()))
            .take(limit)
            .collect();

        self.load_entries(tx, audit_ids).await
    }

    /// Lists entries recorded in `[from, to)`, oldest first.
    ///
    /// Both bounds must fall within years 0000 to 9999.
    pub async fn list_between(
        &self,
        tx: &mut dyn LedgerTransaction,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<AuditEntry>> {
        ensure_storable_timestamp("from", from)?;
        ensure_storable_timestamp("to", to)?;

        if from >= to {
            return Err(AppError::InvalidTimeRange(format!(
                "audit window start '{}' must precede end '{}'",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }

        let lower = timestamp_component(from);
        let upper = timestamp_component(to);
        let prefix = composite_key_prefix(TIME_INDEX_PREFIX, &[])?;
        let index = tx.range_query(prefix.as_str()).await?;

        let audit_ids: Vec<String> = index
            .iter()
            .filter_map(|entry| match split_composite_key(entry.key.as_str()).as_slice() {
                [_, timestamp, audit_id] => Some(((*timestamp).to_owned(), (*audit_id).to_owned())),
                _ => None,
            })
            .filter(|(timestamp, _)| *timestamp >= lower && *timestamp < upper)
            .map(|(_, audit_id)| audit_id)
            .collect();

        self.load_entries(tx, audit_ids).await
    }

    async fn write_entry(
        &self,
        tx: &mut dyn LedgerTransaction,
        ctx: &TransactionContext,
        record: AuditRecord,
    ) -> AppResult<String> {
        let audit_id = allocate_audit_id(tx, ctx).await?;
        let entry = AuditEntry {
            audit_id: audit_id.clone(),
            action: record.action,
            actor_id: ctx.caller().subject().to_owned(),
            resource_id: record.resource_id,
            target_id: record.target_id,
            grant_id: record.grant_id,
            tx_id: ctx.tx_id().to_owned(),
            timestamp: ctx.timestamp(),
            metadata: record.metadata,
        };

        let timestamp = timestamp_component(entry.timestamp);
        let entry_key = composite_key(AUDIT_PREFIX, &[audit_id.as_str()])?;
        let resource_key = composite_key(
            RESOURCE_INDEX_PREFIX,
            &[entry.resource_id.as_str(), timestamp.as_str(), audit_id.as_str()],
        )?;
        let time_key = composite_key(TIME_INDEX_PREFIX, &[timestamp.as_str(), audit_id.as_str()])?;

        let encoded = encode_state(entry_key.as_str(), &entry)?;
        let writes = [
            (entry_key, encoded),
            (resource_key, audit_id.as_bytes().to_vec()),
            (time_key, audit_id.as_bytes().to_vec()),
        ];

        let mut written: Vec<String> = Vec::with_capacity(writes.len());
        for (key, value) in writes {
            if let Err(error) = tx.put_state(key.as_str(), value).await {
                discard_partial_entry(tx, written.as_slice()).await;
                return Err(error);
            }
            written.push(key);
        }

        Ok(audit_id)
    }

    async fn load_entries(
        &self,
        tx: &mut dyn LedgerTransaction,
        audit_ids: Vec<String>,
    ) -> AppResult<Vec<AuditEntry>> {
        let mut entries = Vec::with_capacity(audit_ids.len());
        for audit_id in audit_ids {
            let key = composite_key(AUDIT_PREFIX, &[audit_id.as_str()])?;
            match tx.get_state(key.as_str()).await? {
                Some(value) => entries.push(decode_state(key.as_str(), value.as_slice())?),
                None => warn!(
                    audit_id = audit_id.as_str(),
                    "audit index references a missing entry"
                ),
            }
        }

        Ok(entries)
    }
}

/// Deletes the keys of an entry whose remaining writes failed.
async fn discard_partial_entry(tx: &mut dyn LedgerTransaction, written: &[String]) {
    for key in written {
        if let Err(error) = tx.delete_state(key.as_str()).await {
            warn!(error = %error, key = key.as_str(), "failed to discard partial audit entry");
        }
    }
}

async fn allocate_audit_id(
    tx: &mut dyn LedgerTransaction,
    ctx: &TransactionContext,
) -> AppResult<String> {
    for sequence in 0..MAX_ID_ATTEMPTS {
        let audit_id = ctx.derive_id(AUDIT_PREFIX, sequence);
        let key = composite_key(AUDIT_PREFIX, &[audit_id.as_str()])?;
        if tx.get_state(key.as_str()).await?.is_none() {
            return Ok(audit_id);
        }
    }

    Err(AppError::Internal(format!(
        "transaction '{}' exhausted audit id sequence",
        ctx.tx_id()
    )))
}

fn timestamp_component(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use grantwell_core::AppError;
    use grantwell_domain::AuditAction;

    use crate::LedgerStore;
    use crate::test_support::{FakeLedgerStore, base_time, context_at};

    use super::{AuditRecord, AuditRecorder};

    #[tokio::test]
    async fn entries_are_listed_by_resource_newest_first() {
        let ledger = FakeLedgerStore::default();
        let recorder = AuditRecorder::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));

        for minutes in 0..3 {
            let ctx = context_at("owner", base_time() + Duration::minutes(minutes));
            let audit_id = recorder
                .record(
                    tx.as_mut(),
                    &ctx,
                    AuditRecord::new(AuditAction::AccessAllowed, "R1")
                        .with_metadata("minute", minutes.to_string()),
                )
                .await;
            assert!(audit_id.is_some());
        }
        let other = context_at("owner", base_time());
        assert!(
            recorder
                .record(tx.as_mut(), &other, AuditRecord::new(AuditAction::AccessDenied, "R2"))
                .await
                .is_some()
        );

        let entries = recorder
            .list_for_resource(tx.as_mut(), "R1", 2)
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].metadata.get("minute").map(String::as_str), Some("2"));
        assert_eq!(entries[1].metadata.get("minute").map(String::as_str), Some("1"));
        assert!(entries.iter().all(|entry| entry.actor_id == "owner"));
    }

    #[tokio::test]
    async fn one_transaction_may_record_several_entries() {
        let ledger = FakeLedgerStore::default();
        let recorder = AuditRecorder::default();
        let ctx = context_at("owner", base_time());
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));

        let first = recorder
            .record(tx.as_mut(), &ctx, AuditRecord::new(AuditAction::GrantRevoked, "R1"))
            .await;
        let second = recorder
            .record(tx.as_mut(), &ctx, AuditRecord::new(AuditAction::GrantCreated, "R1"))
            .await;

        assert!(first.is_some());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn window_listing_is_half_open() {
        let ledger = FakeLedgerStore::default();
        let recorder = AuditRecorder::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));

        for hours in 0..4 {
            let ctx = context_at("owner", base_time() + Duration::hours(hours));
            assert!(
                recorder
                    .record(tx.as_mut(), &ctx, AuditRecord::new(AuditAction::AccessAllowed, "R1"))
                    .await
                    .is_some()
            );
        }

        let entries = recorder
            .list_between(
                tx.as_mut(),
                base_time() + Duration::hours(1),
                base_time() + Duration::hours(3),
            )
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        let timestamps: Vec<_> = entries.iter().map(|entry| entry.timestamp).collect();
        assert_eq!(
            timestamps,
            [base_time() + Duration::hours(1), base_time() + Duration::hours(2)]
        );

        let inverted = recorder
            .list_between(tx.as_mut(), base_time(), base_time())
            .await;
        assert!(inverted.is_err_and(|error| error.is_validation()));
    }

    #[tokio::test]
    async fn window_beyond_year_9999_is_rejected() {
        let ledger = FakeLedgerStore::default();
        let recorder = AuditRecorder::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let ctx = context_at("owner", base_time());
        assert!(
            recorder
                .record(tx.as_mut(), &ctx, AuditRecord::new(AuditAction::AccessAllowed, "R1"))
                .await
                .is_some()
        );

        let year_10000 = Utc
            .with_ymd_and_hms(10_000, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(|| panic!("invalid test timestamp"));
        let result = recorder
            .list_between(tx.as_mut(), base_time() - Duration::hours(1), year_10000)
            .await;
        assert!(matches!(result, Err(AppError::InvalidTimeRange(_))));
    }

    #[tokio::test]
    async fn failed_index_write_leaves_no_partial_entry() {
        let ledger = FakeLedgerStore::failing_puts("audit_time");
        let recorder = AuditRecorder::default();
        let ctx = context_at("owner", base_time());
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));

        let audit_id = recorder
            .record(tx.as_mut(), &ctx, AuditRecord::new(AuditAction::GrantCreated, "R1"))
            .await;
        assert!(audit_id.is_none());
        assert_eq!(recorder.write_failures(), 1);

        let trail = recorder
            .list_for_resource(tx.as_mut(), "R1", 10)
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(trail.is_empty());
        assert!(tx.commit().await.is_ok());
        assert!(ledger.keys_with_prefix("audit").await.is_empty());
    }

    #[tokio::test]
    async fn write_failures_are_counted_not_raised() {
        let ledger = FakeLedgerStore::failing_puts("audit");
        let recorder = AuditRecorder::default();
        let ctx = context_at("owner", base_time());
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));

        let audit_id = recorder
            .record(tx.as_mut(), &ctx, AuditRecord::new(AuditAction::AccessDenied, "R1"))
            .await;

        assert!(audit_id.is_none());
        assert_eq!(recorder.write_failures(), 1);
        assert!(tx.commit().await.is_ok());
    }
}
