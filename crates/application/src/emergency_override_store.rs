use chrono::{DateTime, Utc};

use grantwell_core::AppResult;
use grantwell_domain::EmergencyOverride;

use crate::ledger_ports::{LedgerTransaction, composite_key, decode_state, encode_state};

const EMERGENCY_PREFIX: &str = "emergency";

/// Storage for emergency overrides keyed by subject and resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmergencyOverrideStore;

impl EmergencyOverrideStore {
    /// Stores an override, replacing any previous one for the pair.
    pub async fn put(
        &self,
        tx: &mut dyn LedgerTransaction,
        emergency: &EmergencyOverride,
    ) -> AppResult<()> {
        let key = override_key(emergency.subject_id(), emergency.resource_id())?;
        tx.put_state(key.as_str(), encode_state(key.as_str(), emergency)?)
            .await
    }

    /// Loads the stored override for the pair, active or not.
    pub async fn find(
        &self,
        tx: &mut dyn LedgerTransaction,
        subject_id: &str,
        resource_id: &str,
    ) -> AppResult<Option<EmergencyOverride>> {
        let key = override_key(subject_id, resource_id)?;
        tx.get_state(key.as_str())
            .await?
            .map(|value| decode_state(key.as_str(), value.as_slice()))
            .transpose()
    }

    /// Loads the override for the pair only when it is in force at the instant.
    pub async fn find_active(
        &self,
        tx: &mut dyn LedgerTransaction,
        subject_id: &str,
        resource_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<EmergencyOverride>> {
        Ok(self
            .find(tx, subject_id, resource_id)
            .await?
            .filter(|emergency| emergency.is_active(at)))
    }

    /// Removes the override for the pair.
    pub async fn remove(
        &self,
        tx: &mut dyn LedgerTransaction,
        subject_id: &str,
        resource_id: &str,
    ) -> AppResult<()> {
        let key = override_key(subject_id, resource_id)?;
        tx.delete_state(key.as_str()).await
    }
}

fn override_key(subject_id: &str, resource_id: &str) -> AppResult<String> {
    composite_key(EMERGENCY_PREFIX, &[subject_id, resource_id])
}
