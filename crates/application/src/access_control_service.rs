use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use grantwell_core::{AppError, AppResult, TransactionContext};
use grantwell_domain::{
    AccessDecision, AccessGrant, AuditAction, AuditEntry, CachedDecision, DecisionSource,
    EmergencyOverride, GrantEvent, GrantEventAction, GrantId, GrantStatus, Permission,
    ResourceRecord, parse_permission_set, validate_identifier,
};

use crate::access_policy::AccessPolicy;
use crate::audit_recorder::{AuditRecord, AuditRecorder};
use crate::decision_cache::DecisionCache;
use crate::emergency_override_store::EmergencyOverrideStore;
use crate::event_ports::GrantEventPublisher;
use crate::grant_authorizer::GrantAuthorizer;
use crate::grant_store::{CreateGrantInput, GrantStore};
use crate::ledger_ports::{LedgerStore, LedgerTransaction};
use crate::permission_evaluator::{AccessQuery, PermissionEvaluator};
use crate::resource_registry::ResourceRegistry;

mod audit;
mod checks;
mod emergency;
mod grants;
mod resources;

/// Largest page returned by the resource audit trail.
pub const MAX_AUDIT_PAGE: usize = 500;

/// Input payload for registering a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterResourceRequest {
    /// New resource identifier.
    pub resource_id: String,
    /// Resource classification.
    pub resource_type: String,
}

/// Input payload for issuing a grant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GrantAccessRequest {
    /// Resource the grant applies to.
    pub resource_id: String,
    /// Principal receiving the grant.
    pub grantee_id: String,
    /// Permission strings to grant.
    pub permissions: Vec<String>,
    /// Resource type qualifiers; empty grants every type.
    pub resource_types: Vec<String>,
    /// Start of validity; defaults to now.
    pub valid_from: Option<DateTime<Utc>>,
    /// Explicit end of validity.
    pub expires_at: Option<DateTime<Utc>>,
    /// Validity length counted from the start; exclusive with `expires_at`.
    pub expiration_hours: Option<u32>,
    /// Free-form caller policy constraints.
    pub conditions: BTreeMap<String, String>,
}

/// Input payload for revoking a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeAccessRequest {
    /// Grant to revoke.
    pub grant_id: String,
    /// Revoke now instead of at the end of the current UTC day.
    pub immediate: bool,
    /// Revocation reason recorded on the grant.
    pub reason: String,
}

/// Input payload for an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckAccessRequest {
    /// Principal requesting access.
    pub subject_id: String,
    /// Resource being accessed.
    pub resource_id: String,
    /// Requested action.
    pub action: String,
    /// Optional resource type qualifier.
    pub resource_type: Option<String>,
}

/// Input payload for issuing an emergency override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyAccessRequest {
    /// Principal receiving emergency access.
    pub subject_id: String,
    /// Resource covered by the override.
    pub resource_id: String,
    /// Override lifetime in minutes.
    pub duration_minutes: u32,
    /// Justification recorded with the override.
    pub reason: String,
}

/// Grant projection with the status computed at the request instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantView {
    /// Stored grant.
    pub grant: AccessGrant,
    /// Status after applying passive expiry.
    pub effective_status: GrantStatus,
}

impl GrantView {
    fn at(grant: AccessGrant, at: DateTime<Utc>) -> Self {
        let effective_status = grant.effective_status(at);
        Self {
            grant,
            effective_status,
        }
    }
}

/// Public operation surface of the access-control core.
///
/// Every operation runs inside one ledger transaction, so a grant
/// mutation, the decision cache invalidation it causes and its audit entry
/// become visible together or not at all.
#[derive(Clone)]
pub struct AccessControlService {
    ledger: Arc<dyn LedgerStore>,
    event_publisher: Arc<dyn GrantEventPublisher>,
    policy: AccessPolicy,
    grant_store: GrantStore,
    registry: ResourceRegistry,
    emergency_overrides: EmergencyOverrideStore,
    evaluator: PermissionEvaluator,
    authorizer: GrantAuthorizer,
    decision_cache: DecisionCache,
    audit: AuditRecorder,
}

impl AccessControlService {
    /// Creates the service over a ledger and an event publisher.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        event_publisher: Arc<dyn GrantEventPublisher>,
        policy: AccessPolicy,
    ) -> Self {
        let grant_store = GrantStore::new(policy.default_grant_validity);
        let evaluator = PermissionEvaluator::new(grant_store);

        Self {
            ledger,
            event_publisher,
            policy,
            grant_store,
            registry: ResourceRegistry,
            emergency_overrides: EmergencyOverrideStore,
            evaluator,
            authorizer: GrantAuthorizer::new(evaluator),
            decision_cache: DecisionCache::new(policy.decision_cache_ttl),
            audit: AuditRecorder::default(),
        }
    }

    /// Returns the policy the service enforces.
    #[must_use]
    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Returns the number of audit entries lost since startup.
    #[must_use]
    pub fn audit_write_failures(&self) -> u64 {
        self.audit.write_failures()
    }

    async fn publish(&self, event: GrantEvent) {
        let grant_id = event.grant_id.clone();
        let action = event.action;

        if let Err(error) = self.event_publisher.publish(event).await {
            warn!(
                error = %error,
                grant_id = grant_id.as_str(),
                action = ?action,
                "failed to publish grant event"
            );
        }
    }
}

fn grant_event(grant: &AccessGrant, action: GrantEventAction, at: DateTime<Utc>) -> GrantEvent {
    GrantEvent {
        grant_id: grant.grant_id().as_str().to_owned(),
        resource_id: grant.resource_id().to_owned(),
        grantee_id: grant.grantee_id().to_owned(),
        action,
        timestamp: at,
    }
}
