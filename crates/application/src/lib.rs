//! Application services and ports.

#![forbid(unsafe_code)]

mod access_control_service;
mod access_policy;
mod audit_recorder;
mod decision_cache;
mod emergency_override_store;
mod event_ports;
mod grant_authorizer;
mod grant_store;
mod ledger_ports;
mod permission_evaluator;
mod resource_registry;

#[cfg(test)]
mod test_support;

pub use access_control_service::{
    AccessControlService, CheckAccessRequest, EmergencyAccessRequest, GrantAccessRequest,
    GrantView, MAX_AUDIT_PAGE, RegisterResourceRequest, RevokeAccessRequest,
};
pub use access_policy::AccessPolicy;
pub use audit_recorder::{AuditRecord, AuditRecorder};
pub use decision_cache::DecisionCache;
pub use emergency_override_store::EmergencyOverrideStore;
pub use event_ports::GrantEventPublisher;
pub use grant_authorizer::{GrantAuthority, GrantAuthorizer};
pub use grant_store::{CreateGrantInput, GrantStore};
pub use ledger_ports::{
    LedgerEntry, LedgerStore, LedgerTransaction, composite_key, composite_key_prefix,
    split_composite_key,
};
pub use permission_evaluator::{
    AccessQuery, Evaluation, NO_MATCHING_GRANT, PermissionEvaluator, PermissionMatrix,
};
pub use resource_registry::ResourceRegistry;
