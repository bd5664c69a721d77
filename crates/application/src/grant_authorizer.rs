use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use grantwell_core::{AppError, AppResult};
use grantwell_domain::{AccessGrant, Permission, ResourceRecord};

use crate::ledger_ports::LedgerTransaction;
use crate::permission_evaluator::PermissionEvaluator;

/// Basis on which a grantor was allowed to issue a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantAuthority {
    /// Grantor owns the resource.
    Owner,
    /// Grantor holds `admin` on the resource for every resource type.
    Admin,
    /// Grantor holds every permission being granted.
    Holder,
}

impl GrantAuthority {
    /// Returns a stable label for audit metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Holder => "holder",
        }
    }
}

/// Mutation-time authorization checks.
///
/// Every check reads effective grants straight from the grant store and
/// never consults the decision cache, so a mutation is authorized against
/// the same state it is about to change.
#[derive(Debug, Clone, Copy)]
pub struct GrantAuthorizer {
    evaluator: PermissionEvaluator,
}

impl GrantAuthorizer {
    /// Creates an authorizer over the evaluator.
    #[must_use]
    pub fn new(evaluator: PermissionEvaluator) -> Self {
        Self { evaluator }
    }

    /// Confirms the grantor may issue the permissions on the resource.
    ///
    /// Owners and unscoped resource admins may grant anything. Anyone else
    /// must hold each permission being granted across the requested
    /// `resource_types`, and must additionally hold `delegate` there to hand
    /// out any delegation-bearing permission. An empty `resource_types`
    /// requests every type.
    pub async fn authorize_grant(
        &self,
        tx: &mut dyn LedgerTransaction,
        grantor_id: &str,
        resource: &ResourceRecord,
        permissions: &BTreeSet<Permission>,
        resource_types: &BTreeSet<String>,
        at: DateTime<Utc>,
    ) -> AppResult<GrantAuthority> {
        if resource.is_owned_by(grantor_id) {
            return Ok(GrantAuthority::Owner);
        }

        let matrix = self
            .evaluator
            .permission_matrix(tx, grantor_id, resource.resource_id(), at)
            .await?;

        if matrix.permits_within(&Permission::admin(), &BTreeSet::new()) {
            return Ok(GrantAuthority::Admin);
        }

        if let Some(missing) = permissions
            .iter()
            .find(|permission| !matrix.permits_within(permission, resource_types))
        {
            return Err(AppError::InsufficientGrantorPermission {
                grantor: grantor_id.to_owned(),
                permission: missing.as_str().to_owned(),
            });
        }

        let grants_delegation = permissions
            .iter()
            .any(Permission::is_delegation_bearing);
        if grants_delegation && !matrix.permits_within(&Permission::delegate(), resource_types) {
            return Err(AppError::NoDelegationRights {
                grantor: grantor_id.to_owned(),
            });
        }

        Ok(GrantAuthority::Holder)
    }

    /// Confirms the revoker is the grantor, the resource owner or a resource admin.
    pub async fn authorize_revoke(
        &self,
        tx: &mut dyn LedgerTransaction,
        revoker_id: &str,
        grant: &AccessGrant,
        resource: Option<&ResourceRecord>,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if grant.grantor_id() == revoker_id {
            return Ok(());
        }

        if self
            .is_administrator(tx, revoker_id, grant.resource_id(), resource, at)
            .await?
        {
            return Ok(());
        }

        Err(AppError::NotAuthorized(format!(
            "'{revoker_id}' is neither the grantor of '{}' nor an administrator of resource '{}'",
            grant.grant_id(),
            grant.resource_id()
        )))
    }

    /// Confirms the actor owns or administers the resource.
    pub async fn authorize_administration(
        &self,
        tx: &mut dyn LedgerTransaction,
        actor_id: &str,
        resource: &ResourceRecord,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if self
            .is_administrator(tx, actor_id, resource.resource_id(), Some(resource), at)
            .await?
        {
            return Ok(());
        }

        Err(AppError::NotAuthorized(format!(
            "'{actor_id}' does not administer resource '{}'",
            resource.resource_id()
        )))
    }

    /// Returns whether the actor owns the resource or holds unscoped resource `admin`.
    pub async fn is_administrator(
        &self,
        tx: &mut dyn LedgerTransaction,
        actor_id: &str,
        resource_id: &str,
        resource: Option<&ResourceRecord>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        if resource.is_some_and(|record| record.is_owned_by(actor_id)) {
            return Ok(true);
        }

        self.evaluator
            .holds_permission(tx, actor_id, resource_id, &Permission::admin(), at)
            .await
    }
}
