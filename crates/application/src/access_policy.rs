use chrono::Duration;

/// Tunable time bounds applied by the access-control core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Maximum age of a served decision cache entry.
    pub decision_cache_ttl: Duration,
    /// Validity applied when a grant request names no expiry.
    pub default_grant_validity: Duration,
    /// Longest emergency override that may be issued.
    pub max_emergency_duration: Duration,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            decision_cache_ttl: Duration::hours(1),
            default_grant_validity: Duration::days(30),
            max_emergency_duration: Duration::hours(4),
        }
    }
}
