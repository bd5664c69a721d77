use chrono::{DateTime, Utc};
use grantwell_core::AppResult;
use serde::{Deserialize, Serialize};

use crate::identifier::validate_identifier;

/// Ownership record anchoring grant-time authorization for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    resource_id: String,
    resource_type: String,
    owner_id: String,
    registered_at: DateTime<Utc>,
}

impl ResourceRecord {
    /// Creates a validated resource ownership record.
    pub fn new(
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
        owner_id: impl Into<String>,
        registered_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let resource_id = resource_id.into();
        let resource_type = resource_type.into();
        let owner_id = owner_id.into();
        validate_identifier("resource_id", resource_id.as_str())?;
        validate_identifier("resource_type", resource_type.as_str())?;
        validate_identifier("owner_id", owner_id.as_str())?;

        Ok(Self {
            resource_id,
            resource_type,
            owner_id,
            registered_at,
        })
    }

    /// Returns the resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.resource_type.as_str()
    }

    /// Returns the owning principal.
    #[must_use]
    pub fn owner_id(&self) -> &str {
        self.owner_id.as_str()
    }

    /// Returns the registration timestamp.
    #[must_use]
    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Returns whether the principal owns the resource.
    #[must_use]
    pub fn is_owned_by(&self, principal: &str) -> bool {
        self.owner_id == principal
    }
}
