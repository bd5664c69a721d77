use axum::Json;
use axum::extract::{Extension, Query, State};
use grantwell_core::TransactionContext;

use crate::dto::{AuditEntryResponse, AuditWindowQuery};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn audit_window_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Query(query): Query<AuditWindowQuery>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let entries = state
        .access_control_service
        .audit_window(&ctx, query.from, query.to)
        .await?
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
