use axum::Json;
use axum::extract::{Extension, State};
use grantwell_core::TransactionContext;

use crate::dto::{AccessDecisionResponse, CheckAccessBody};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn check_access_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Json(payload): Json<CheckAccessBody>,
) -> ApiResult<Json<AccessDecisionResponse>> {
    let decision = state
        .access_control_service
        .check_access(&ctx, payload.into())
        .await?;

    Ok(Json(AccessDecisionResponse::from(decision)))
}
