use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use grantwell_core::AppError;
use serde::Serialize;
use tracing::error;

/// API error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    message: String,
    code: &'static str,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            error if error.is_validation() => StatusCode::BAD_REQUEST,
            error if error.is_not_authorized() => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyRevoked(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, code = self.0.code(), "request failed");
        }

        let payload = Json(ErrorResponse {
            message: self.0.to_string(),
            code: self.0.code(),
        });

        (status, payload).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use grantwell_core::AppError;

    use super::ApiError;

    fn status_of(error: AppError) -> StatusCode {
        ApiError(error).into_response().status()
    }

    #[test]
    fn error_categories_map_to_http_statuses() {
        assert_eq!(
            status_of(AppError::Validation("empty".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::InvalidTimeRange("backwards".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::NotFound("grant".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::AlreadyRevoked("grant".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Conflict("mvcc".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::NoDelegationRights {
                grantor: "alice".to_owned()
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(AppError::StoreUnavailable("down".to_owned())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AppError::Internal("bug".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn body_carries_message_and_code() {
        let response = ApiError(AppError::InsufficientGrantorPermission {
            grantor: "alice".to_owned(),
            permission: "write".to_owned(),
        })
        .into_response();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        let body: serde_json::Value =
            serde_json::from_slice(&bytes).unwrap_or_else(|error| panic!("{error}"));

        assert_eq!(body["code"], "insufficient_grantor_permission");
        assert!(
            body["message"]
                .as_str()
                .is_some_and(|message| message.contains("'write'"))
        );
    }
}
