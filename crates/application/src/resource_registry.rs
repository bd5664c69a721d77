use grantwell_core::{AppError, AppResult, TransactionContext};
use grantwell_domain::ResourceRecord;

use crate::ledger_ports::{LedgerTransaction, composite_key, decode_state, encode_state};

const RESOURCE_PREFIX: &str = "resource";

/// Ownership records for resources that grants may reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceRegistry;

impl ResourceRegistry {
    /// Records the caller as owner of a new resource.
    pub async fn register(
        &self,
        tx: &mut dyn LedgerTransaction,
        ctx: &TransactionContext,
        resource_id: &str,
        resource_type: &str,
    ) -> AppResult<ResourceRecord> {
        let record = ResourceRecord::new(
            resource_id,
            resource_type,
            ctx.caller().subject(),
            ctx.timestamp(),
        )?;

        let key = composite_key(RESOURCE_PREFIX, &[record.resource_id()])?;
        if tx.get_state(key.as_str()).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "resource '{resource_id}' is already registered"
            )));
        }

        tx.put_state(key.as_str(), encode_state(key.as_str(), &record)?)
            .await?;
        Ok(record)
    }

    /// Loads a resource record when present.
    pub async fn find(
        &self,
        tx: &mut dyn LedgerTransaction,
        resource_id: &str,
    ) -> AppResult<Option<ResourceRecord>> {
        let key = composite_key(RESOURCE_PREFIX, &[resource_id])?;
        tx.get_state(key.as_str())
            .await?
            .map(|value| decode_state(key.as_str(), value.as_slice()))
            .transpose()
    }

    /// Loads a resource record, failing with `NotFound` when absent.
    pub async fn get(
        &self,
        tx: &mut dyn LedgerTransaction,
        resource_id: &str,
    ) -> AppResult<ResourceRecord> {
        self.find(tx, resource_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("resource '{resource_id}' is not registered"))
        })
    }
}

#[cfg(test)]
mod tests {
    use grantwell_core::AppError;

    use crate::LedgerStore;
    use crate::test_support::{FakeLedgerStore, base_time, context_at};

    use super::ResourceRegistry;

    #[tokio::test]
    async fn register_records_caller_as_owner_once() {
        let ledger = FakeLedgerStore::default();
        let ctx = context_at("owner", base_time());
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));

        let record = ResourceRegistry
            .register(tx.as_mut(), &ctx, "R1", "medical_record")
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(record.is_owned_by("owner"));

        let duplicate = ResourceRegistry
            .register(tx.as_mut(), &ctx, "R1", "medical_record")
            .await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let missing = ResourceRegistry.get(tx.as_mut(), "R2").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
