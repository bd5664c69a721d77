use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use grantwell_application::RevokeAccessRequest;
use grantwell_core::TransactionContext;

use crate::dto::{CreateGrantBody, CreateGrantResponse, GrantResponse, RevokeGrantBody};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_grant_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Json(payload): Json<CreateGrantBody>,
) -> ApiResult<(StatusCode, Json<CreateGrantResponse>)> {
    let grant = state
        .access_control_service
        .grant_access(&ctx, payload.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateGrantResponse {
            grant_id: grant.grant_id().as_str().to_owned(),
        }),
    ))
}

pub async fn get_grant_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Path(grant_id): Path<String>,
) -> ApiResult<Json<GrantResponse>> {
    let grant = state
        .access_control_service
        .get_grant(&ctx, grant_id.as_str())
        .await?;

    Ok(Json(GrantResponse::from(grant)))
}

pub async fn revoke_grant_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Path(grant_id): Path<String>,
    Json(payload): Json<RevokeGrantBody>,
) -> ApiResult<StatusCode> {
    state
        .access_control_service
        .revoke_access(
            &ctx,
            RevokeAccessRequest {
                grant_id,
                immediate: payload.immediate,
                reason: payload.reason,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_subject_grants_handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<TransactionContext>,
    Path(subject_id): Path<String>,
) -> ApiResult<Json<Vec<GrantResponse>>> {
    let grants = state
        .access_control_service
        .query_grants(&ctx, subject_id.as_str())
        .await?
        .into_iter()
        .map(GrantResponse::from)
        .collect();

    Ok(Json(grants))
}
