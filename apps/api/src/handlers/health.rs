use axum::Json;
use axum::extract::State;

use crate::dto::HealthResponse;
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ledger: state.ledger_backend,
        audit_write_failures: state.access_control_service.audit_write_failures(),
    })
}
