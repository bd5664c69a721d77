use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use grantwell_core::TransactionContext;

use crate::dto::{EmergencyAccessBody, EmergencyOverrideResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn grant_emergency_access_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Json(payload): Json<EmergencyAccessBody>,
) -> ApiResult<(StatusCode, Json<EmergencyOverrideResponse>)> {
    let emergency = state
        .access_control_service
        .grant_emergency_access(&ctx, payload.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(EmergencyOverrideResponse::from(emergency)),
    ))
}

pub async fn revoke_emergency_access_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Path((subject_id, resource_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .access_control_service
        .revoke_emergency_access(&ctx, subject_id.as_str(), resource_id.as_str())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
