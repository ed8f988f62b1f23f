use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity header missing")]
    MissingIdentity,
    #[error("identity header malformed")]
    InvalidIdentity,
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        let code = match value {
            AuthError::MissingIdentity => "missing_identity",
            AuthError::InvalidIdentity => "invalid_identity",
        };
        ApiError::Unauthorized { code, trace_id: None, message: Some(value.to_string()) }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
