use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use grantwell_core::AppError;
use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by the access-control core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Emitted when a grant is created.
    GrantCreated,
    /// Emitted when a grant is revoked, immediately or at end of day.
    GrantRevoked,
    /// Emitted for every allowed access check.
    AccessAllowed,
    /// Emitted for every denied access check.
    AccessDenied,
    /// Emitted when an emergency override allows an access check.
    EmergencyAccess,
    /// Emitted when an emergency override is issued.
    EmergencyGranted,
    /// Emitted when an emergency override is withdrawn.
    EmergencyRevoked,
    /// Emitted when a resource owner is recorded.
    ResourceRegistered,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GrantCreated => "GRANT_CREATED",
            Self::GrantRevoked => "GRANT_REVOKED",
            Self::AccessAllowed => "ACCESS_ALLOWED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::EmergencyAccess => "EMERGENCY_ACCESS",
            Self::EmergencyGranted => "EMERGENCY_GRANTED",
            Self::EmergencyRevoked => "EMERGENCY_REVOKED",
            Self::ResourceRegistered => "RESOURCE_REGISTERED",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "GRANT_CREATED" => Ok(Self::GrantCreated),
            "GRANT_REVOKED" => Ok(Self::GrantRevoked),
            "ACCESS_ALLOWED" => Ok(Self::AccessAllowed),
            "ACCESS_DENIED" => Ok(Self::AccessDenied),
            "EMERGENCY_ACCESS" => Ok(Self::EmergencyAccess),
            "EMERGENCY_GRANTED" => Ok(Self::EmergencyGranted),
            "EMERGENCY_REVOKED" => Ok(Self::EmergencyRevoked),
            "RESOURCE_REGISTERED" => Ok(Self::ResourceRegistered),
            _ => Err(AppError::Validation(format!(
                "unknown audit action value '{value}'"
            ))),
        }
    }
}

/// Append-only audit history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub audit_id: String,
    /// Recorded action.
    pub action: AuditAction,
    /// Principal performing the operation.
    pub actor_id: String,
    /// Resource the event concerns.
    pub resource_id: String,
    /// Principal affected by the operation, when distinct from the actor.
    pub target_id: Option<String>,
    /// Grant involved, when any.
    pub grant_id: Option<String>,
    /// Transaction that produced the entry.
    pub tx_id: String,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Outcome details such as requested action, reason or decision source.
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::AuditAction;

    #[test]
    fn audit_action_roundtrip_storage_value() {
        let action = AuditAction::EmergencyAccess;
        let restored = AuditAction::from_str(action.as_str());
        assert!(matches!(restored, Ok(AuditAction::EmergencyAccess)));
    }

    #[test]
    fn audit_action_serializes_as_storage_value() {
        let encoded = serde_json::to_string(&AuditAction::AccessDenied)
            .unwrap_or_else(|error| panic!("{error}"));
        assert_eq!(encoded, "\"ACCESS_DENIED\"");
    }
}
