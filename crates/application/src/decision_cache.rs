use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use grantwell_core::AppResult;
use grantwell_domain::{CachedDecision, Permission};

use crate::ledger_ports::{
    LedgerTransaction, composite_key, composite_key_prefix, decode_state, encode_state,
};

const DECISION_PREFIX: &str = "decision";
const UNTYPED_SCOPE: &str = "untyped";

/// Memoized access decisions keyed by subject, resource, action and scope.
///
/// Entries live in the ledger so invalidation commits atomically with the
/// grant mutation that causes it.
#[derive(Debug, Clone, Copy)]
pub struct DecisionCache {
    ttl: Duration,
}

impl DecisionCache {
    /// Creates a cache serving entries younger than the TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Returns a fresh entry for the key, treating stale entries as absent.
    pub async fn lookup(
        &self,
        tx: &mut dyn LedgerTransaction,
        subject_id: &str,
        resource_id: &str,
        action: &Permission,
        resource_type: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<CachedDecision>> {
        let key = decision_key(subject_id, resource_id, action, resource_type)?;
        let Some(value) = tx.get_state(key.as_str()).await? else {
            return Ok(None);
        };

        let cached: CachedDecision = decode_state(key.as_str(), value.as_slice())?;
        Ok(cached.is_fresh(at, self.ttl).then_some(cached))
    }

    /// Stores a decision, replacing any previous entry for the key.
    pub async fn store(
        &self,
        tx: &mut dyn LedgerTransaction,
        subject_id: &str,
        resource_id: &str,
        action: &Permission,
        resource_type: Option<&str>,
        decision: &CachedDecision,
    ) -> AppResult<()> {
        let key = decision_key(subject_id, resource_id, action, resource_type)?;
        tx.put_state(key.as_str(), encode_state(key.as_str(), decision)?)
            .await
    }

    /// Deletes every cached decision for the subject and resource.
    ///
    /// Covers all actions and scopes, so a mutation that changes any
    /// effective permission of the pair leaves no stale entry behind.
    pub async fn invalidate_all(
        &self,
        tx: &mut dyn LedgerTransaction,
        subject_id: &str,
        resource_id: &str,
    ) -> AppResult<usize> {
        let prefix = composite_key_prefix(DECISION_PREFIX, &[subject_id, resource_id])?;
        let entries = tx.range_query(prefix.as_str()).await?;

        for entry in &entries {
            tx.delete_state(entry.key.as_str()).await?;
        }

        debug!(
            subject_id,
            resource_id,
            invalidated = entries.len(),
            "invalidated cached decisions"
        );
        Ok(entries.len())
    }
}

fn decision_key(
    subject_id: &str,
    resource_id: &str,
    action: &Permission,
    resource_type: Option<&str>,
) -> AppResult<String> {
    let scope = resource_type.map_or_else(
        || UNTYPED_SCOPE.to_owned(),
        |resource_type| format!("type:{resource_type}"),
    );

    composite_key(
        DECISION_PREFIX,
        &[subject_id, resource_id, action.as_str(), scope.as_str()],
    )
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use grantwell_domain::{CachedDecision, Permission};

    use crate::LedgerStore;
    use crate::test_support::{FakeLedgerStore, base_time};

    use super::DecisionCache;

    fn permission(value: &str) -> Permission {
        Permission::new(value).unwrap_or_else(|error| panic!("{error}"))
    }

    fn allow(stable_for: Duration) -> CachedDecision {
        CachedDecision {
            allowed: true,
            reason: "granted by 'grant_1'".to_owned(),
            grant_id: Some("grant_1".to_owned()),
            decided_at: base_time(),
            stable_until: Some(base_time() + stable_for),
        }
    }

    #[tokio::test]
    async fn lookup_respects_ttl_and_stability_bound() {
        let ledger = FakeLedgerStore::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let cache = DecisionCache::new(Duration::hours(1));
        let read = permission("read");

        let stored = cache
            .store(tx.as_mut(), "U1", "R1", &read, None, &allow(Duration::minutes(20)))
            .await;
        assert!(stored.is_ok());

        let fresh = cache
            .lookup(tx.as_mut(), "U1", "R1", &read, None, base_time() + Duration::minutes(10))
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(fresh.is_some_and(|entry| entry.allowed));

        let past_bound = cache
            .lookup(tx.as_mut(), "U1", "R1", &read, None, base_time() + Duration::minutes(20))
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(past_bound.is_none());
    }

    #[tokio::test]
    async fn scopes_are_cached_independently() {
        let ledger = FakeLedgerStore::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let cache = DecisionCache::new(Duration::hours(1));
        let read = permission("read");

        let stored = cache
            .store(tx.as_mut(), "U1", "R1", &read, Some("lab_result"), &allow(Duration::hours(2)))
            .await;
        assert!(stored.is_ok());

        let untyped = cache
            .lookup(tx.as_mut(), "U1", "R1", &read, None, base_time())
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(untyped.is_none());
    }

    #[tokio::test]
    async fn invalidate_all_clears_every_action_for_the_pair_only() {
        let ledger = FakeLedgerStore::default();
        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let cache = DecisionCache::new(Duration::hours(1));

        for (subject, action) in [("U1", "read"), ("U1", "write"), ("U10", "read")] {
            let stored = cache
                .store(tx.as_mut(), subject, "R1", &permission(action), None, &allow(Duration::hours(2)))
                .await;
            assert!(stored.is_ok());
        }
        assert!(tx.commit().await.is_ok());

        let mut tx = ledger.begin().await.unwrap_or_else(|error| panic!("{error}"));
        let removed = cache
            .invalidate_all(tx.as_mut(), "U1", "R1")
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        assert!(tx.commit().await.is_ok());

        assert_eq!(removed, 2);
        assert!(ledger.keys_with_prefix("decision~U1~").await.is_empty());
        assert_eq!(ledger.keys_with_prefix("decision~U10~R1~").await.len(), 1);
    }
}
