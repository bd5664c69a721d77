use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use grantwell_application::{GrantAccessRequest, GrantView};
use serde::{Deserialize, Serialize};

/// Incoming payload for issuing a grant.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGrantBody {
    pub resource_id: String,
    pub grantee_id: String,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub resource_types: Vec<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expiration_hours: Option<u32>,
    #[serde(default)]
    pub conditions: BTreeMap<String, String>,
}

impl From<CreateGrantBody> for GrantAccessRequest {
    fn from(value: CreateGrantBody) -> Self {
        Self {
            resource_id: value.resource_id,
            grantee_id: value.grantee_id,
            permissions: value.permissions,
            resource_types: value.resource_types,
            valid_from: value.valid_from,
            expires_at: value.expires_at,
            expiration_hours: value.expiration_hours,
            conditions: value.conditions,
        }
    }
}

/// Identifier of a newly issued grant.
#[derive(Debug, Serialize)]
pub struct CreateGrantResponse {
    pub grant_id: String,
}

/// Incoming payload for revoking a grant.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevokeGrantBody {
    #[serde(default)]
    pub immediate: bool,
    pub reason: String,
}

/// API representation of a grant with its status at request time.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub grant_id: String,
    pub resource_id: String,
    pub grantor_id: String,
    pub grantee_id: String,
    pub permissions: Vec<String>,
    pub resource_types: Vec<String>,
    pub valid_from: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: &'static str,
    pub effective_status: &'static str,
    pub conditions: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
    pub revoke_reason: Option<String>,
}

impl From<GrantView> for GrantResponse {
    fn from(value: GrantView) -> Self {
        let grant = value.grant;
        Self {
            grant_id: grant.grant_id().as_str().to_owned(),
            resource_id: grant.resource_id().to_owned(),
            grantor_id: grant.grantor_id().to_owned(),
            grantee_id: grant.grantee_id().to_owned(),
            permissions: grant
                .permissions()
                .iter()
                .map(|permission| permission.as_str().to_owned())
                .collect(),
            resource_types: grant.resource_types().iter().cloned().collect(),
            valid_from: grant.valid_from(),
            expires_at: grant.expires_at(),
            status: grant.status().as_str(),
            effective_status: value.effective_status.as_str(),
            conditions: grant.conditions().clone(),
            created_at: grant.created_at(),
            revoked_at: grant.revoked_at(),
            revoked_by: grant.revoked_by().map(ToOwned::to_owned),
            revoke_reason: grant.revoke_reason().map(ToOwned::to_owned),
        }
    }
}
