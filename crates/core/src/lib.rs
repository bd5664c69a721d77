//! Shared primitives for all Rust crates in Grantwell.

#![forbid(unsafe_code)]

/// Transaction context and caller identity primitives.
pub mod context;

use thiserror::Error;

pub use context::{CallerIdentity, TransactionContext};

/// Result type used across Grantwell crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Validity window where the start is not strictly before the end.
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Revocation requested for a grant that is already revoked.
    #[error("already revoked: {0}")]
    AlreadyRevoked(String),

    /// Actor is not allowed to perform the requested mutation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Grantor tried to hand out a permission it does not hold itself.
    #[error("not authorized: grantor '{grantor}' does not hold permission '{permission}'")]
    InsufficientGrantorPermission {
        /// Grantor principal.
        grantor: String,
        /// First permission the grantor is missing.
        permission: String,
    },

    /// Grantor tried to hand out grant-making rights without holding `delegate`.
    #[error("not authorized: grantor '{grantor}' holds no delegation rights")]
    NoDelegationRights {
        /// Grantor principal.
        grantor: String,
    },

    /// Write rejected because state read by the transaction changed concurrently.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence layer could not be reached; no state was changed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether the caller may safely retry the operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Conflict(_))
    }

    /// Returns whether the error belongs to the validation class.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidTimeRange(_))
    }

    /// Returns whether the error belongs to the authorization class.
    #[must_use]
    pub fn is_not_authorized(&self) -> bool {
        matches!(
            self,
            Self::NotAuthorized(_)
                | Self::InsufficientGrantorPermission { .. }
                | Self::NoDelegationRights { .. }
        )
    }

    /// Returns a stable machine-readable code for transports.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::InvalidTimeRange(_) => "invalid_time_range",
            Self::NotFound(_) => "not_found",
            Self::AlreadyRevoked(_) => "already_revoked",
            Self::NotAuthorized(_) => "not_authorized",
            Self::InsufficientGrantorPermission { .. } => "insufficient_grantor_permission",
            Self::NoDelegationRights { .. } => "no_delegation_rights",
            Self::Conflict(_) => "conflict",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Internal(_) => "internal",
        }
    }
}
