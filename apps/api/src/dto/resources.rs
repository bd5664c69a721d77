use chrono::{DateTime, Utc};
use grantwell_application::RegisterResourceRequest;
use grantwell_domain::ResourceRecord;
use serde::{Deserialize, Serialize};

/// Incoming payload for resource registration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterResourceBody {
    pub resource_id: String,
    pub resource_type: String,
}

impl From<RegisterResourceBody> for RegisterResourceRequest {
    fn from(value: RegisterResourceBody) -> Self {
        Self {
            resource_id: value.resource_id,
            resource_type: value.resource_type,
        }
    }
}

/// API representation of a registered resource.
#[derive(Debug, Serialize)]
pub struct ResourceResponse {
    pub resource_id: String,
    pub resource_type: String,
    pub owner_id: String,
    pub registered_at: DateTime<Utc>,
}

impl From<ResourceRecord> for ResourceResponse {
    fn from(value: ResourceRecord) -> Self {
        Self {
            resource_id: value.resource_id().to_owned(),
            resource_type: value.resource_type().to_owned(),
            owner_id: value.owner_id().to_owned(),
            registered_at: value.registered_at(),
        }
    }
}
