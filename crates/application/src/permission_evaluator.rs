use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use grantwell_core::AppResult;
use grantwell_domain::{
    AccessDecision, AccessGrant, DecisionSource, EmergencyOverride, GrantStatus, Permission,
    is_wildcard,
};

use crate::emergency_override_store::EmergencyOverrideStore;
use crate::grant_store::GrantStore;
use crate::ledger_ports::LedgerTransaction;

/// Reason reported for every denial.
pub const NO_MATCHING_GRANT: &str = "no matching grant found";

/// Access question posed to the evaluator.
#[derive(Debug, Clone, Copy)]
pub struct AccessQuery<'a> {
    /// Principal requesting access.
    pub subject_id: &'a str,
    /// Resource being accessed.
    pub resource_id: &'a str,
    /// Requested action.
    pub action: &'a Permission,
    /// Optional resource type qualifier.
    pub resource_type: Option<&'a str>,
}

/// Effective grants for one subject and resource at one instant.
#[derive(Debug, Clone, Default)]
pub struct PermissionMatrix {
    grants: Vec<AccessGrant>,
}

impl PermissionMatrix {
    /// Returns whether the action is held across the whole resource type scope.
    ///
    /// An empty or wildcard scope needs a grant that is itself unrestricted.
    /// Otherwise every listed type must be admitted by some grant carrying
    /// the action.
    #[must_use]
    pub fn permits_within(&self, action: &Permission, resource_types: &BTreeSet<String>) -> bool {
        if resource_types.is_empty() || resource_types.iter().any(|scope| is_wildcard(scope.as_str())) {
            return self
                .grants
                .iter()
                .any(|grant| grant.permits(action) && grant.has_unrestricted_scope());
        }

        resource_types.iter().all(|resource_type| {
            self.grants.iter().any(|grant| {
                grant.permits(action) && grant.admits_resource_type(Some(resource_type.as_str()))
            })
        })
    }

    /// Returns the satisfying grant that stays effective the longest.
    #[must_use]
    pub fn satisfying_grant(&self, action: &Permission) -> Option<&AccessGrant> {
        self.grants
            .iter()
            .filter(|grant| grant.permits(action))
            .max_by_key(|grant| grant.expires_at())
    }
}

/// Evaluator output.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Allow or deny with provenance.
    pub decision: AccessDecision,
    /// Earliest instant at which the outcome could change without any write.
    pub stable_until: Option<DateTime<Utc>>,
    /// Override that allowed the check, when the emergency path was taken.
    pub emergency: Option<EmergencyOverride>,
}

/// Deterministic allow/deny decisions over the grant store.
///
/// Expiry is computed at read time from each grant's validity window; a
/// stored `active` status never outlives `expires_at`.
#[derive(Debug, Clone, Copy)]
pub struct PermissionEvaluator {
    grant_store: GrantStore,
    emergency_overrides: EmergencyOverrideStore,
}

impl PermissionEvaluator {
    /// Creates an evaluator reading grants from the store.
    #[must_use]
    pub fn new(grant_store: GrantStore) -> Self {
        Self {
            grant_store,
            emergency_overrides: EmergencyOverrideStore,
        }
    }

    /// Decides whether the subject may perform the action on the resource.
    pub async fn evaluate(
        &self,
        tx: &mut dyn LedgerTransaction,
        query: AccessQuery<'_>,
        at: DateTime<Utc>,
    ) -> AppResult<Evaluation> {
        if let Some(emergency) = self
            .emergency_overrides
            .find_active(tx, query.subject_id, query.resource_id, at)
            .await?
        {
            return Ok(Evaluation {
                decision: AccessDecision {
                    allowed: true,
                    reason: format!(
                        "emergency override active until {}",
                        emergency.expires_at().to_rfc3339()
                    ),
                    grant_id: None,
                    source: DecisionSource::Emergency,
                },
                stable_until: Some(emergency.expires_at()),
                emergency: Some(emergency),
            });
        }

        let grants = self
            .grant_store
            .list_grants_for_grantee_on_resource(tx, query.subject_id, query.resource_id)
            .await?;
        let matrix = build_matrix(grants.iter(), query.resource_type, at);

        if let Some(grant) = matrix.satisfying_grant(query.action) {
            return Ok(Evaluation {
                decision: AccessDecision {
                    allowed: true,
                    reason: format!("granted by '{}'", grant.grant_id()),
                    grant_id: Some(grant.grant_id().as_str().to_owned()),
                    source: DecisionSource::Evaluated,
                },
                stable_until: Some(grant.expires_at()),
                emergency: None,
            });
        }

        let next_activation = grants
            .iter()
            .filter(|grant| {
                grant.status() == GrantStatus::Active
                    && grant.valid_from() > at
                    && grant.admits_resource_type(query.resource_type)
                    && grant.permits(query.action)
            })
            .map(AccessGrant::valid_from)
            .min();

        Ok(Evaluation {
            decision: AccessDecision {
                allowed: false,
                reason: NO_MATCHING_GRANT.to_owned(),
                grant_id: None,
                source: DecisionSource::Evaluated,
            },
            stable_until: next_activation,
            emergency: None,
        })
    }

    /// Builds the permission matrix for the pair from effective grants only.
    ///
    /// Scoped grants stay in the matrix; callers ask about scope through
    /// [`PermissionMatrix::permits_within`].
    pub async fn permission_matrix(
        &self,
        tx: &mut dyn LedgerTransaction,
        subject_id: &str,
        resource_id: &str,
        at: DateTime<Utc>,
    ) -> AppResult<PermissionMatrix> {
        let grants = self
            .grant_store
            .list_grants_for_grantee_on_resource(tx, subject_id, resource_id)
            .await?;
        Ok(build_matrix(grants.iter(), None, at))
    }

    /// Returns whether the subject holds the permission for every resource type.
    ///
    /// Reads the grant store directly; emergency overrides and the decision
    /// cache never confer grant-making or administrative rights. A grant
    /// scoped to particular resource types does not count.
    pub async fn holds_permission(
        &self,
        tx: &mut dyn LedgerTransaction,
        subject_id: &str,
        resource_id: &str,
        permission: &Permission,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        Ok(self
            .permission_matrix(tx, subject_id, resource_id, at)
            .await?
            .permits_within(permission, &BTreeSet::new()))
    }
}

fn build_matrix<'a>(
    grants: impl Iterator<Item = &'a AccessGrant>,
    resource_type: Option<&str>,
    at: DateTime<Utc>,
) -> PermissionMatrix {
    PermissionMatrix {
        grants: grants
            .filter(|grant| grant.is_effective(at) && grant.admits_resource_type(resource_type))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::Duration;

    use grantwell_domain::{DecisionSource, EmergencyOverride, Permission};

    use crate::emergency_override_store::EmergencyOverrideStore;
    use crate::grant_store::{CreateGrantInput, GrantStore};
    use crate::test_support::{FakeLedgerStore, base_time, context_at};
    use crate::{LedgerStore, LedgerTransaction};

    use super::{AccessQuery, NO_MATCHING_GRANT, PermissionEvaluator};

    fn permission(value: &str) -> Permission {
        Permission::new(value).unwrap_or_else(|error| panic!("{error}"))
    }

    fn evaluator() -> PermissionEvaluator {
        PermissionEvaluator::new(GrantStore::new(Duration::days(30)))
    }

    async fn seed_grant(
        tx: &mut dyn LedgerTransaction,
        permissions: &[&str],
        valid_from_offset: Duration,
        lifetime: Duration,
    ) -> String {
        let ctx = context_at("owner", base_time());
        let valid_from = base_time() + valid_from_offset;
        GrantStore::new(Duration::days(30))
            .create_grant(
                tx,
                &ctx,
                CreateGrantInput {
                    resource_id: "R1".to_owned(),
                    grantor_id: "owner".to_owned(),
                    grantee_id: "U1".to_owned(),
                    permissions: permissions.iter().map(|value| permission(value)).collect(),
                    resource_types: BTreeSet::new(),
                    valid_from: Some(valid_from),
                    expires_at: Some(valid_from + lifetime),
                    conditions: BTreeMap::new(),
                },
            )
            .await
            .unwrap_or_else(|error| panic!("{error}"))
            .grant_id()
            .as_str()
            .to_owned()
    }

    #[tokio::test]
    async fn subject_without_grants_is_denied_without_error() {
        let ledger = FakeLedgerStore::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let read = permission("read");

        let evaluation = evaluator()
            .evaluate(
                tx.as_mut(),
                AccessQuery {
                    subject_id: "U1",
                    resource_id: "R1",
                    action: &read,
                    resource_type: None,
                },
                base_time(),
            )
            .await
            .unwrap_or_else(|error| panic!("{error}"));

        assert!(!evaluation.decision.allowed);
        assert_eq!(evaluation.decision.reason, NO_MATCHING_GRANT);
        assert_eq!(evaluation.stable_until, None);
    }

    #[tokio::test]
    async fn union_of_effective_grants_decides() {
        let ledger = FakeLedgerStore::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let short = seed_grant(tx.as_mut(), &["read"], Duration::zero(), Duration::hours(1)).await;
        let long = seed_grant(tx.as_mut(), &["read", "write"], Duration::zero(), Duration::hours(5)).await;

        let matrix = evaluator()
            .permission_matrix(tx.as_mut(), "U1", "R1", base_time())
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        let unscoped = BTreeSet::new();
        assert!(matrix.permits_within(&permission("write"), &unscoped));
        assert!(!matrix.permits_within(&permission("delete"), &unscoped));

        let read = permission("read");
        let evaluation = evaluator()
            .evaluate(
                tx.as_mut(),
                AccessQuery {
                    subject_id: "U1",
                    resource_id: "R1",
                    action: &read,
                    resource_type: None,
                },
                base_time(),
            )
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(evaluation.decision.allowed);
        assert_eq!(evaluation.decision.grant_id.as_deref(), Some(long.as_str()));
        assert_ne!(short, long);
        assert_eq!(evaluation.stable_until, Some(base_time() + Duration::hours(5)));
    }

    #[tokio::test]
    async fn expired_and_pending_grants_do_not_count() {
        let ledger = FakeLedgerStore::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        seed_grant(tx.as_mut(), &["read"], Duration::zero(), Duration::hours(1)).await;
        seed_grant(tx.as_mut(), &["read"], Duration::hours(3), Duration::hours(1)).await;

        let read = permission("read");
        let query = AccessQuery {
            subject_id: "U1",
            resource_id: "R1",
            action: &read,
            resource_type: None,
        };
        let evaluation = evaluator()
            .evaluate(tx.as_mut(), query, base_time() + Duration::hours(2))
            .await
            .unwrap_or_else(|error| panic!("{error}"));

        assert!(!evaluation.decision.allowed);
        assert_eq!(evaluation.stable_until, Some(base_time() + Duration::hours(3)));
    }

    #[tokio::test]
    async fn active_emergency_override_short_circuits() {
        let ledger = FakeLedgerStore::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let emergency = EmergencyOverride::new(
            "U1",
            "R1",
            "owner",
            "cardiac arrest",
            base_time(),
            base_time() + Duration::minutes(30),
        )
        .unwrap_or_else(|error| panic!("{error}"));
        assert!(EmergencyOverrideStore.put(tx.as_mut(), &emergency).await.is_ok());

        let write = permission("write");
        let query = AccessQuery {
            subject_id: "U1",
            resource_id: "R1",
            action: &write,
            resource_type: None,
        };
        let during = evaluator()
            .evaluate(tx.as_mut(), query, base_time() + Duration::minutes(10))
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(during.decision.allowed);
        assert_eq!(during.decision.source, DecisionSource::Emergency);
        assert!(during.emergency.is_some());

        let after = evaluator()
            .evaluate(tx.as_mut(), query, base_time() + Duration::minutes(30))
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(!after.decision.allowed);
    }

    #[tokio::test]
    async fn emergency_override_does_not_confer_held_permissions() {
        let ledger = FakeLedgerStore::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let emergency = EmergencyOverride::new(
            "U1",
            "R1",
            "owner",
            "triage",
            base_time(),
            base_time() + Duration::minutes(30),
        )
        .unwrap_or_else(|error| panic!("{error}"));
        assert!(EmergencyOverrideStore.put(tx.as_mut(), &emergency).await.is_ok());

        let held = evaluator()
            .holds_permission(tx.as_mut(), "U1", "R1", &Permission::admin(), base_time())
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(!held);
    }

    #[tokio::test]
    async fn scoped_grant_only_covers_its_resource_types() {
        let ledger = FakeLedgerStore::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let ctx = context_at("owner", base_time());
        GrantStore::new(Duration::days(30))
            .create_grant(
                tx.as_mut(),
                &ctx,
                CreateGrantInput {
                    resource_id: "R1".to_owned(),
                    grantor_id: "owner".to_owned(),
                    grantee_id: "U1".to_owned(),
                    permissions: BTreeSet::from([permission("read"), Permission::admin()]),
                    resource_types: BTreeSet::from(["imaging".to_owned()]),
                    valid_from: Some(base_time()),
                    expires_at: Some(base_time() + Duration::hours(1)),
                    conditions: BTreeMap::new(),
                },
            )
            .await
            .unwrap_or_else(|error| panic!("{error}"));

        let matrix = evaluator()
            .permission_matrix(tx.as_mut(), "U1", "R1", base_time())
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        let read = permission("read");
        let scope = |types: &[&str]| -> BTreeSet<String> {
            types.iter().map(|value| (*value).to_owned()).collect()
        };
        assert!(matrix.permits_within(&read, &scope(&["imaging"])));
        assert!(!matrix.permits_within(&read, &scope(&["imaging", "lab_result"])));
        assert!(!matrix.permits_within(&read, &scope(&[])));
        assert!(!matrix.permits_within(&read, &scope(&["*"])));

        let admin = evaluator()
            .holds_permission(tx.as_mut(), "U1", "R1", &Permission::admin(), base_time())
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(!admin);
    }
}
