use chrono::{DateTime, Utc};
use grantwell_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::identifier::validate_identifier;

/// Time-bounded allow path for one subject on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyOverride {
    subject_id: String,
    resource_id: String,
    granted_by: String,
    reason: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl EmergencyOverride {
    /// Creates an override; the expiry must be strictly after creation.
    pub fn new(
        subject_id: impl Into<String>,
        resource_id: impl Into<String>,
        granted_by: impl Into<String>,
        reason: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let subject_id = subject_id.into();
        let resource_id = resource_id.into();
        let granted_by = granted_by.into();
        let reason = reason.into();
        validate_identifier("subject_id", subject_id.as_str())?;
        validate_identifier("resource_id", resource_id.as_str())?;
        validate_identifier("granted_by", granted_by.as_str())?;

        if reason.trim().is_empty() {
            return Err(AppError::Validation(
                "emergency access reason must not be empty".to_owned(),
            ));
        }

        if created_at >= expires_at {
            return Err(AppError::InvalidTimeRange(
                "emergency access must expire after it is granted".to_owned(),
            ));
        }

        Ok(Self {
            subject_id,
            resource_id,
            granted_by,
            reason,
            created_at,
            expires_at,
        })
    }

    /// Returns the subject allowed through the override.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        self.subject_id.as_str()
    }

    /// Returns the resource covered by the override.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }

    /// Returns the principal who issued the override.
    #[must_use]
    pub fn granted_by(&self) -> &str {
        self.granted_by.as_str()
    }

    /// Returns the recorded justification.
    #[must_use]
    pub fn reason(&self) -> &str {
        self.reason.as_str()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the expiry timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns whether the override is in force at the instant.
    #[must_use]
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.created_at <= at && at < self.expires_at
    }
}
