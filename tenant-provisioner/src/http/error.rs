use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tenant_core::TenantError;
use tracing::error;

/// A [`TenantError`] on its way out as a Feathers-style JSON body.
#[derive(Debug)]
pub struct ApiError(pub TenantError);

impl From<TenantError> for ApiError {
    fn from(e: TenantError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(TenantError::validation(format!(
            "Failed to parse the request body as JSON: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let TenantError::Internal(inner) = &self.0 {
            error!(error = ?inner, "unexpected failure");
        }
        let status = StatusCode::from_u16(self.0.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_json())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
