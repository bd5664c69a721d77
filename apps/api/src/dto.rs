mod access;
mod audit;
mod common;
mod grants;
mod resources;

pub use access::{
    AccessDecisionResponse, CheckAccessBody, EmergencyAccessBody, EmergencyOverrideResponse,
};
pub use audit::{AuditEntryResponse, AuditTrailQuery, AuditWindowQuery, DEFAULT_AUDIT_PAGE};
pub use common::HealthResponse;
pub use grants::{CreateGrantBody, CreateGrantResponse, GrantResponse, RevokeGrantBody};
pub use resources::{RegisterResourceBody, ResourceResponse};
