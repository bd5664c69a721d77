use chrono::{DateTime, Utc};
use grantwell_application::{CheckAccessRequest, EmergencyAccessRequest};
use grantwell_domain::{AccessDecision, EmergencyOverride};
use serde::{Deserialize, Serialize};

/// Incoming payload for an access check.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckAccessBody {
    pub subject_id: String,
    pub resource_id: String,
    pub action: String,
    pub resource_type: Option<String>,
}

impl From<CheckAccessBody> for CheckAccessRequest {
    fn from(value: CheckAccessBody) -> Self {
        Self {
            subject_id: value.subject_id,
            resource_id: value.resource_id,
            action: value.action,
            resource_type: value.resource_type,
        }
    }
}

/// Access decision with its provenance.
#[derive(Debug, Serialize)]
pub struct AccessDecisionResponse {
    pub allowed: bool,
    pub reason: String,
    pub grant_id: Option<String>,
    pub source: &'static str,
}

impl From<AccessDecision> for AccessDecisionResponse {
    fn from(value: AccessDecision) -> Self {
        Self {
            allowed: value.allowed,
            reason: value.reason,
            grant_id: value.grant_id,
            source: value.source.as_str(),
        }
    }
}

/// Incoming payload for an emergency override.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmergencyAccessBody {
    pub subject_id: String,
    pub resource_id: String,
    pub duration_minutes: u32,
    pub reason: String,
}

impl From<EmergencyAccessBody> for EmergencyAccessRequest {
    fn from(value: EmergencyAccessBody) -> Self {
        Self {
            subject_id: value.subject_id,
            resource_id: value.resource_id,
            duration_minutes: value.duration_minutes,
            reason: value.reason,
        }
    }
}

/// API representation of an emergency override.
#[derive(Debug, Serialize)]
pub struct EmergencyOverrideResponse {
    pub subject_id: String,
    pub resource_id: String,
    pub granted_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<EmergencyOverride> for EmergencyOverrideResponse {
    fn from(value: EmergencyOverride) -> Self {
        Self {
            subject_id: value.subject_id().to_owned(),
            resource_id: value.resource_id().to_owned(),
            granted_by: value.granted_by().to_owned(),
            reason: value.reason().to_owned(),
            created_at: value.created_at(),
            expires_at: value.expires_at(),
        }
    }
}
