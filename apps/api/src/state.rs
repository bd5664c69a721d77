use grantwell_application::AccessControlService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub access_control_service: AccessControlService,
    pub ledger_backend: &'static str,
}
