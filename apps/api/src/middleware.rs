use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use grantwell_core::{AppError, AppResult, CallerIdentity, TransactionContext};

use crate::error::ApiResult;

/// Header carrying the principal asserted by the upstream gateway.
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Opens a transaction context for the calling principal.
pub async fn require_principal(mut request: Request, next: Next) -> ApiResult<Response> {
    let caller = caller_from_headers(request.headers())?;
    request
        .extensions_mut()
        .insert(TransactionContext::begin_now(caller));

    Ok(next.run(request).await)
}

pub fn caller_from_headers(headers: &HeaderMap) -> AppResult<CallerIdentity> {
    let principal = headers
        .get(PRINCIPAL_HEADER)
        .ok_or_else(|| AppError::NotAuthorized(format!("missing {PRINCIPAL_HEADER} header")))?
        .to_str()
        .map_err(|_| {
            AppError::NotAuthorized(format!("{PRINCIPAL_HEADER} header must be visible ASCII"))
        })?;

    CallerIdentity::new(principal.trim())
}
