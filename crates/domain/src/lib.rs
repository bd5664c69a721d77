//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod decision;
mod emergency;
mod event;
mod grant;
mod identifier;
mod permission;
mod resource;

pub use audit::{AuditAction, AuditEntry};
pub use decision::{AccessDecision, CachedDecision, DecisionSource};
pub use emergency::EmergencyOverride;
pub use event::{GrantEvent, GrantEventAction};
pub use grant::{
    AccessGrant, GrantId, GrantStatus, LATEST_STORABLE_YEAR, NewAccessGrant, ValidityWindow,
    end_of_day, ensure_storable_timestamp,
};
pub use identifier::{IDENTIFIER_MAX_LENGTH, KEY_SEPARATOR, validate_identifier};
pub use permission::{Permission, is_wildcard, parse_permission_set};
pub use resource::ResourceRecord;
