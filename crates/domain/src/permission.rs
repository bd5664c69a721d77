use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use grantwell_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::identifier::validate_identifier;

/// Permission string carried by a grant or requested by an access check.
///
/// Values are trimmed and lowercased. `*` and `all` are wildcards that
/// satisfy any requested action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(String);

impl Permission {
    /// Wildcard symbol.
    pub const WILDCARD: &'static str = "*";
    /// Wildcard word form.
    pub const ALL: &'static str = "all";
    /// Resource-scoped administrative permission.
    pub const ADMIN: &'static str = "admin";
    /// Permission gating the issuance of grant-making rights.
    pub const DELEGATE: &'static str = "delegate";

    /// Creates a validated permission value.
    pub fn new(value: impl AsRef<str>) -> AppResult<Self> {
        let normalized = value.as_ref().trim().to_ascii_lowercase();
        validate_identifier("permission", normalized.as_str())?;
        Ok(Self(normalized))
    }

    /// Returns the `admin` permission.
    #[must_use]
    pub fn admin() -> Self {
        Self(Self::ADMIN.to_owned())
    }

    /// Returns the `delegate` permission.
    #[must_use]
    pub fn delegate() -> Self {
        Self(Self::DELEGATE.to_owned())
    }

    /// Returns the normalized permission string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether the permission matches any action.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        is_wildcard(self.0.as_str())
    }

    /// Returns whether granting this permission hands out grant-making ability.
    #[must_use]
    pub fn is_delegation_bearing(&self) -> bool {
        self.0.contains(Self::DELEGATE) || self.0.contains("grant")
    }

    /// Returns whether holding this permission satisfies the requested action.
    #[must_use]
    pub fn satisfies(&self, requested: &Permission) -> bool {
        self.is_wildcard() || self == requested
    }
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for Permission {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0
    }
}

/// Parses transport permission strings into a non-empty deduplicated set.
pub fn parse_permission_set<I, S>(values: I) -> AppResult<BTreeSet<Permission>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let permissions = values
        .into_iter()
        .map(Permission::new)
        .collect::<AppResult<BTreeSet<_>>>()?;

    if permissions.is_empty() {
        return Err(AppError::Validation(
            "permissions must contain at least one entry".to_owned(),
        ));
    }

    Ok(permissions)
}

/// Returns whether a raw qualifier is one of the wildcard spellings.
#[must_use]
pub fn is_wildcard(value: &str) -> bool {
    value == Permission::WILDCARD || value.eq_ignore_ascii_case(Permission::ALL)
}
