use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use grantwell_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::identifier::validate_identifier;
use crate::permission::{Permission, is_wildcard};

/// Immutable grant identifier assigned at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GrantId(String);

impl GrantId {
    /// Creates a validated grant identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        validate_identifier("grant_id", value.as_str())?;
        Ok(Self(value))
    }

    /// Returns the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for GrantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for GrantId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GrantId> for String {
    fn from(value: GrantId) -> Self {
        value.0
    }
}

/// Grant lifecycle status.
///
/// `Expired` is never written; it is reported when the validity window has
/// closed while the stored status still reads `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Grant may be effective inside its validity window.
    Active,
    /// Grant was revoked immediately.
    Revoked,
    /// Grant validity window has closed.
    Expired,
}

impl GrantStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

/// Half-open validity window `[valid_from, expires_at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    valid_from: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ValidityWindow {
    /// Creates a window, rejecting empty or inverted ranges.
    pub fn new(valid_from: DateTime<Utc>, expires_at: DateTime<Utc>) -> AppResult<Self> {
        ensure_storable_timestamp("valid_from", valid_from)?;
        ensure_storable_timestamp("expires_at", expires_at)?;

        if valid_from >= expires_at {
            return Err(AppError::InvalidTimeRange(format!(
                "valid_from '{}' must be before expires_at '{}'",
                valid_from.to_rfc3339(),
                expires_at.to_rfc3339()
            )));
        }

        Ok(Self {
            valid_from,
            expires_at,
        })
    }

    /// Returns the inclusive start of the window.
    #[must_use]
    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    /// Returns the exclusive end of the window.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns whether the instant lies inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && at < self.expires_at
    }
}

/// Validated input for a new grant record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccessGrant {
    /// Identifier assigned by the grant store.
    pub grant_id: GrantId,
    /// Resource the grant applies to.
    pub resource_id: String,
    /// Principal issuing the grant.
    pub grantor_id: String,
    /// Principal receiving the grant.
    pub grantee_id: String,
    /// Granted permissions.
    pub permissions: BTreeSet<Permission>,
    /// Resource type qualifiers; empty means unrestricted.
    pub resource_types: BTreeSet<String>,
    /// Validity window.
    pub validity: ValidityWindow,
    /// Free-form caller policy constraints, not interpreted by the core.
    pub conditions: BTreeMap<String, String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Durable access grant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    grant_id: GrantId,
    resource_id: String,
    grantor_id: String,
    grantee_id: String,
    permissions: BTreeSet<Permission>,
    resource_types: BTreeSet<String>,
    valid_from: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    status: GrantStatus,
    conditions: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<String>,
    revoke_reason: Option<String>,
}

impl AccessGrant {
    /// Creates an active grant after validating identifiers and permissions.
    pub fn new(input: NewAccessGrant) -> AppResult<Self> {
        validate_identifier("resource_id", input.resource_id.as_str())?;
        validate_identifier("grantor_id", input.grantor_id.as_str())?;
        validate_identifier("grantee_id", input.grantee_id.as_str())?;

        if input.permissions.is_empty() {
            return Err(AppError::Validation(
                "grant permissions must not be empty".to_owned(),
            ));
        }

        for resource_type in &input.resource_types {
            validate_identifier("resource_type", resource_type.as_str())?;
        }

        Ok(Self {
            grant_id: input.grant_id,
            resource_id: input.resource_id,
            grantor_id: input.grantor_id,
            grantee_id: input.grantee_id,
            permissions: input.permissions,
            resource_types: input.resource_types,
            valid_from: input.validity.valid_from(),
            expires_at: input.validity.expires_at(),
            status: GrantStatus::Active,
            conditions: input.conditions,
            created_at: input.created_at,
            revoked_at: None,
            revoked_by: None,
            revoke_reason: None,
        })
    }

    /// Returns the grant identifier.
    #[must_use]
    pub fn grant_id(&self) -> &GrantId {
        &self.grant_id
    }

    /// Returns the resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }

    /// Returns the grantor principal.
    #[must_use]
    pub fn grantor_id(&self) -> &str {
        self.grantor_id.as_str()
    }

    /// Returns the grantee principal.
    #[must_use]
    pub fn grantee_id(&self) -> &str {
        self.grantee_id.as_str()
    }

    /// Returns granted permissions.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Returns resource type qualifiers.
    #[must_use]
    pub fn resource_types(&self) -> &BTreeSet<String> {
        &self.resource_types
    }

    /// Returns the inclusive start of the validity window.
    #[must_use]
    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    /// Returns the exclusive end of the validity window.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the stored status, which may lag passive expiry.
    #[must_use]
    pub fn status(&self) -> GrantStatus {
        self.status
    }

    /// Returns caller policy conditions.
    #[must_use]
    pub fn conditions(&self) -> &BTreeMap<String, String> {
        &self.conditions
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when revocation was requested, if ever.
    #[must_use]
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Returns the revoking principal, if any.
    #[must_use]
    pub fn revoked_by(&self) -> Option<&str> {
        self.revoked_by.as_deref()
    }

    /// Returns the revocation reason, if any.
    #[must_use]
    pub fn revoke_reason(&self) -> Option<&str> {
        self.revoke_reason.as_deref()
    }

    /// Returns whether the grant is effective at the instant.
    ///
    /// Effective iff status is active and `valid_from <= at < expires_at`.
    #[must_use]
    pub fn is_effective(&self, at: DateTime<Utc>) -> bool {
        self.status == GrantStatus::Active && self.valid_from <= at && at < self.expires_at
    }

    /// Returns the status as observed at the instant, computing passive expiry.
    #[must_use]
    pub fn effective_status(&self, at: DateTime<Utc>) -> GrantStatus {
        match self.status {
            GrantStatus::Active if at >= self.expires_at => GrantStatus::Expired,
            status => status,
        }
    }

    /// Returns whether the grant has a revocation scheduled for end of day.
    #[must_use]
    pub fn has_scheduled_revocation(&self) -> bool {
        self.status == GrantStatus::Active && self.revoked_at.is_some()
    }

    /// Returns whether any granted permission satisfies the requested action.
    #[must_use]
    pub fn permits(&self, requested: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|permission| permission.satisfies(requested))
    }

    /// Returns whether the grant's resource type scope admits the qualifier.
    #[must_use]
    pub fn admits_resource_type(&self, resource_type: Option<&str>) -> bool {
        let Some(resource_type) = resource_type else {
            return true;
        };

        self.resource_types.is_empty()
            || self
                .resource_types
                .iter()
                .any(|scope| is_wildcard(scope.as_str()) || scope == resource_type)
    }

    /// Returns whether the grant applies to every resource type.
    #[must_use]
    pub fn has_unrestricted_scope(&self) -> bool {
        self.resource_types.is_empty()
            || self
                .resource_types
                .iter()
                .any(|scope| is_wildcard(scope.as_str()))
    }

    /// Revokes the grant with immediate effect.
    pub fn revoke_immediately(
        &mut self,
        at: DateTime<Utc>,
        revoked_by: &str,
        reason: &str,
    ) -> AppResult<()> {
        if self.status == GrantStatus::Revoked {
            return Err(AppError::AlreadyRevoked(format!(
                "grant '{}' is already revoked",
                self.grant_id
            )));
        }

        self.status = GrantStatus::Revoked;
        self.expires_at = self.expires_at.min(at);
        self.record_revocation(at, revoked_by, reason);
        Ok(())
    }

    /// Schedules expiry at the next UTC midnight, leaving the grant active until then.
    pub fn schedule_revocation(
        &mut self,
        at: DateTime<Utc>,
        revoked_by: &str,
        reason: &str,
    ) -> AppResult<()> {
        if self.status == GrantStatus::Revoked || self.revoked_at.is_some() {
            return Err(AppError::AlreadyRevoked(format!(
                "grant '{}' is already revoked",
                self.grant_id
            )));
        }

        self.expires_at = self.expires_at.min(end_of_day(at)?);
        self.record_revocation(at, revoked_by, reason);
        Ok(())
    }

    fn record_revocation(&mut self, at: DateTime<Utc>, revoked_by: &str, reason: &str) {
        self.revoked_at = Some(at);
        self.revoked_by = Some(revoked_by.to_owned());
        self.revoke_reason = Some(reason.to_owned());
    }
}

/// Last calendar year a stored timestamp may fall in.
pub const LATEST_STORABLE_YEAR: i32 = 9999;

/// Rejects instants whose RFC 3339 rendering needs more than four year digits.
///
/// Ledger keys embed RFC 3339 timestamps and rely on their lexical order.
pub fn ensure_storable_timestamp(field_name: &str, at: DateTime<Utc>) -> AppResult<()> {
    if (0..=LATEST_STORABLE_YEAR).contains(&at.year()) {
        return Ok(());
    }

    Err(AppError::InvalidTimeRange(format!(
        "{field_name} '{}' is outside years 0000 to {LATEST_STORABLE_YEAR}",
        at.to_rfc3339()
    )))
}

/// Returns the next UTC midnight strictly after the instant's calendar day starts.
pub fn end_of_day(at: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    at.date_naive()
        .succ_opt()
        .map(|next_day| next_day.and_time(NaiveTime::MIN).and_utc())
        .ok_or_else(|| AppError::Internal(format!("no calendar day follows '{at}'")))
}
