use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};

use grantwell_core::{AppError, AppResult, TransactionContext};
use grantwell_domain::{
    AccessGrant, GrantId, NewAccessGrant, Permission, ValidityWindow, validate_identifier,
};

use crate::ledger_ports::{
    LedgerTransaction, composite_key, composite_key_prefix, decode_state, encode_state,
    split_composite_key,
};

const GRANT_PREFIX: &str = "grant";
const GRANTEE_INDEX_PREFIX: &str = "grantee";
const RESOURCE_INDEX_PREFIX: &str = "resource_grant";
const MAX_ID_ATTEMPTS: u32 = 64;

/// Input for creating a grant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGrantInput {
    /// Resource the grant applies to.
    pub resource_id: String,
    /// Principal issuing the grant.
    pub grantor_id: String,
    /// Principal receiving the grant.
    pub grantee_id: String,
    /// Granted permissions; must not be empty.
    pub permissions: BTreeSet<Permission>,
    /// Resource type qualifiers; empty means unrestricted.
    pub resource_types: BTreeSet<String>,
    /// Start of validity; defaults to the transaction timestamp.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of validity; defaults to the start plus the default validity.
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form caller policy constraints.
    pub conditions: BTreeMap<String, String>,
}

/// Durable grant records plus by-grantee and by-resource indices.
///
/// Index entries are written in the same transaction as the primary record,
/// and grantee and resource never change after creation, so the indices
/// cannot drift from the primary table.
#[derive(Debug, Clone, Copy)]
pub struct GrantStore {
    default_validity: Duration,
}

impl GrantStore {
    /// Creates a store applying the default validity to open-ended requests.
    #[must_use]
    pub fn new(default_validity: Duration) -> Self {
        Self { default_validity }
    }

    /// Persists a new active grant and its index entries.
    pub async fn create_grant(
        &self,
        tx: &mut dyn LedgerTransaction,
        ctx: &TransactionContext,
        input: CreateGrantInput,
    ) -> AppResult<AccessGrant> {
        let validity =
            self.resolve_validity(ctx.timestamp(), input.valid_from, input.expires_at)?;
        let grant_id = self.allocate_grant_id(tx, ctx).await?;

        let grant = AccessGrant::new(NewAccessGrant {
            grant_id,
            resource_id: input.resource_id,
            grantor_id: input.grantor_id,
            grantee_id: input.grantee_id,
            permissions: input.permissions,
            resource_types: input.resource_types,
            validity,
            conditions: input.conditions,
            created_at: ctx.timestamp(),
        })?;

        let grant_key = grant_key(grant.grant_id())?;
        tx.put_state(grant_key.as_str(), encode_state(grant_key.as_str(), &grant)?)
            .await?;

        let id_bytes = grant.grant_id().as_str().as_bytes().to_vec();
        let grantee_key = composite_key(
            GRANTEE_INDEX_PREFIX,
            &[grant.grantee_id(), grant.resource_id(), grant.grant_id().as_str()],
        )?;
        tx.put_state(grantee_key.as_str(), id_bytes.clone()).await?;

        let resource_key = composite_key(
            RESOURCE_INDEX_PREFIX,
            &[grant.resource_id(), grant.grantee_id(), grant.grant_id().as_str()],
        )?;
        tx.put_state(resource_key.as_str(), id_bytes).await?;

        Ok(grant)
    }

    /// Loads a grant, failing with `NotFound` when absent.
    pub async fn get_grant(
        &self,
        tx: &mut dyn LedgerTransaction,
        grant_id: &GrantId,
    ) -> AppResult<AccessGrant> {
        self.find_grant(tx, grant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("grant '{grant_id}' does not exist")))
    }

    /// Loads a grant when present.
    pub async fn find_grant(
        &self,
        tx: &mut dyn LedgerTransaction,
        grant_id: &GrantId,
    ) -> AppResult<Option<AccessGrant>> {
        let key = grant_key(grant_id)?;
        tx.get_state(key.as_str())
            .await?
            .map(|value| decode_state(key.as_str(), value.as_slice()))
            .transpose()
    }

    /// Revokes a grant immediately or at the end of the current UTC day.
    ///
    /// Authorization of the revoker is the caller's responsibility.
    pub async fn revoke_grant(
        &self,
        tx: &mut dyn LedgerTransaction,
        grant_id: &GrantId,
        revoker_id: &str,
        reason: &str,
        immediate: bool,
        at: DateTime<Utc>,
    ) -> AppResult<AccessGrant> {
        let mut grant = self.get_grant(tx, grant_id).await?;

        if immediate {
            grant.revoke_immediately(at, revoker_id, reason)?;
        } else {
            grant.schedule_revocation(at, revoker_id, reason)?;
        }

        let key = grant_key(grant_id)?;
        tx.put_state(key.as_str(), encode_state(key.as_str(), &grant)?)
            .await?;

        Ok(grant)
    }

    /// Lists every grant held by the grantee, deduplicated by grant id.
    pub async fn list_grants_for_grantee(
        &self,
        tx: &mut dyn LedgerTransaction,
        grantee_id: &str,
    ) -> AppResult<Vec<AccessGrant>> {
        let prefix = composite_key_prefix(GRANTEE_INDEX_PREFIX, &[grantee_id])?;
        self.load_indexed(tx, prefix.as_str()).await
    }

    /// Lists grants held by the grantee on one resource.
    pub async fn list_grants_for_grantee_on_resource(
        &self,
        tx: &mut dyn LedgerTransaction,
        grantee_id: &str,
        resource_id: &str,
    ) -> AppResult<Vec<AccessGrant>> {
        let prefix = composite_key_prefix(GRANTEE_INDEX_PREFIX, &[grantee_id, resource_id])?;
        self.load_indexed(tx, prefix.as_str()).await
    }

    /// Lists every grant issued on the resource.
    pub async fn list_grants_for_resource(
        &self,
        tx: &mut dyn LedgerTransaction,
        resource_id: &str,
    ) -> AppResult<Vec<AccessGrant>> {
        let prefix = composite_key_prefix(RESOURCE_INDEX_PREFIX, &[resource_id])?;
        self.load_indexed(tx, prefix.as_str()).await
    }

    fn resolve_validity(
        &self,
        at: DateTime<Utc>,
        valid_from: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<ValidityWindow> {
        let valid_from = valid_from.unwrap_or(at);
        let expires_at = match expires_at {
            Some(expires_at) => expires_at,
            None => valid_from
                .checked_add_signed(self.default_validity)
                .ok_or_else(|| {
                    AppError::InvalidTimeRange(format!(
                        "default validity from '{}' overflows the calendar",
                        valid_from.to_rfc3339()
                    ))
                })?,
        };

        if expires_at <= at {
            return Err(AppError::InvalidTimeRange(format!(
                "expires_at '{}' must be in the future",
                expires_at.to_rfc3339()
            )));
        }

        ValidityWindow::new(valid_from, expires_at)
    }

    async fn allocate_grant_id(
        &self,
        tx: &mut dyn LedgerTransaction,
        ctx: &TransactionContext,
    ) -> AppResult<GrantId> {
        for sequence in 0..MAX_ID_ATTEMPTS {
            let grant_id = GrantId::new(ctx.derive_id(GRANT_PREFIX, sequence))?;
            if tx.get_state(grant_key(&grant_id)?.as_str()).await?.is_none() {
                return Ok(grant_id);
            }
        }

        Err(AppError::Internal(format!(
            "transaction '{}' exhausted grant id sequence",
            ctx.tx_id()
        )))
    }

    async fn load_indexed(
        &self,
        tx: &mut dyn LedgerTransaction,
        prefix: &str,
    ) -> AppResult<Vec<AccessGrant>> {
        let grant_ids = tx
            .range_query(prefix)
            .await?
            .iter()
            .filter_map(|entry| split_composite_key(entry.key.as_str()).last().copied())
            .map(GrantId::new)
            .collect::<AppResult<BTreeSet<_>>>()?;

        let mut grants = Vec::with_capacity(grant_ids.len());
        for grant_id in grant_ids {
            let grant = self.find_grant(tx, &grant_id).await?.ok_or_else(|| {
                AppError::Internal(format!(
                    "index entry under '{prefix}' references missing grant '{grant_id}'"
                ))
            })?;
            grants.push(grant);
        }

        grants.sort_by(|left, right| {
            left.created_at()
                .cmp(&right.created_at())
                .then_with(|| left.grant_id().cmp(right.grant_id()))
        });
        Ok(grants)
    }
}

fn grant_key(grant_id: &GrantId) -> AppResult<String> {
    validate_identifier("grant_id", grant_id.as_str())?;
    composite_key(GRANT_PREFIX, &[grant_id.as_str()])
}
