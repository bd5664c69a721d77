use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Where an access decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Served from a fresh decision cache entry.
    Cache,
    /// Computed from effective grants.
    Evaluated,
    /// Allowed by an active emergency override.
    Emergency,
}

impl DecisionSource {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Evaluated => "evaluated",
            Self::Emergency => "emergency",
        }
    }
}

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    /// Whether access is permitted.
    pub allowed: bool,
    /// Human-readable explanation.
    pub reason: String,
    /// Grant that satisfied the check, when allowed by a grant.
    pub grant_id: Option<String>,
    /// Decision provenance.
    pub source: DecisionSource,
}

/// Memoized evaluator outcome stored in the decision cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDecision {
    /// Whether access was permitted.
    pub allowed: bool,
    /// Evaluator explanation.
    pub reason: String,
    /// Grant that satisfied the check, if any.
    pub grant_id: Option<String>,
    /// Evaluation timestamp.
    pub decided_at: DateTime<Utc>,
    /// Earliest instant at which passive expiry or activation could change the outcome.
    pub stable_until: Option<DateTime<Utc>>,
}

impl CachedDecision {
    /// Returns whether the entry may still be served at the instant.
    ///
    /// Entries older than the TTL, entries past their stability bound and
    /// entries dated in the future are all treated as absent.
    #[must_use]
    pub fn is_fresh(&self, at: DateTime<Utc>, ttl: Duration) -> bool {
        if at < self.decided_at || at >= self.decided_at + ttl {
            return false;
        }

        self.stable_until.is_none_or(|bound| at < bound)
    }
}
