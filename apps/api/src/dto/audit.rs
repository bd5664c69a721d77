use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use grantwell_domain::AuditEntry;
use serde::{Deserialize, Serialize};

/// Page size used when the audit trail request names none.
pub const DEFAULT_AUDIT_PAGE: usize = 100;

/// Query parameters for a resource audit trail.
#[derive(Debug, Deserialize)]
pub struct AuditTrailQuery {
    pub limit: Option<usize>,
}

/// Query parameters for a time-window audit listing.
#[derive(Debug, Deserialize)]
pub struct AuditWindowQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// API representation of an audit entry.
#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    pub audit_id: String,
    pub action: &'static str,
    pub actor_id: String,
    pub resource_id: String,
    pub target_id: Option<String>,
    pub grant_id: Option<String>,
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(value: AuditEntry) -> Self {
        Self {
            audit_id: value.audit_id,
            action: value.action.as_str(),
            actor_id: value.actor_id,
            resource_id: value.resource_id,
            target_id: value.target_id,
            grant_id: value.grant_id,
            tx_id: value.tx_id,
            timestamp: value.timestamp,
            metadata: value.metadata,
        }
    }
}
