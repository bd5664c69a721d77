use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use grantwell_core::TransactionContext;

use crate::dto::{
    AuditEntryResponse, AuditTrailQuery, DEFAULT_AUDIT_PAGE, GrantResponse, RegisterResourceBody,
    ResourceResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn register_resource_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Json(payload): Json<RegisterResourceBody>,
) -> ApiResult<(StatusCode, Json<ResourceResponse>)> {
    let resource = state
        .access_control_service
        .register_resource(&ctx, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(ResourceResponse::from(resource))))
}

pub async fn get_resource_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Path(resource_id): Path<String>,
) -> ApiResult<Json<ResourceResponse>> {
    let resource = state
        .access_control_service
        .get_resource(&ctx, resource_id.as_str())
        .await?;

    Ok(Json(ResourceResponse::from(resource)))
}

pub async fn list_resource_grants_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Path(resource_id): Path<String>,
) -> ApiResult<Json<Vec<GrantResponse>>> {
    let grants = state
        .access_control_service
        .query_resource_grants(&ctx, resource_id.as_str())
        .await?
        .into_iter()
        .map(GrantResponse::from)
        .collect();

    Ok(Json(grants))
}

pub async fn resource_audit_trail_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Path(resource_id): Path<String>,
    Query(query): Query<AuditTrailQuery>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let entries = state
        .access_control_service
        .resource_audit_trail(
            &ctx,
            resource_id.as_str(),
            query.limit.unwrap_or(DEFAULT_AUDIT_PAGE),
        )
        .await?
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
