use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: Uuid,
    pub trace_id: Option<Uuid>,
}

pub struct CallerIdentityExtractor(pub CallerIdentity);

fn user_from_headers(headers: &HeaderMap) -> Result<Uuid, AuthError> {
    let raw = headers
        .get("X-User-ID")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingIdentity)?;
    Uuid::parse_str(raw).map_err(|_| AuthError::InvalidIdentity)
}

fn trace_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers.get("X-Trace-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentityExtractor where S: Send + Sync {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let user_id = user_from_headers(headers)?;

        let trace_id = trace_id_from_headers(headers).or_else(|| Some(Uuid::new_v4()));

        Span::current().record("user_id", tracing::field::display(user_id));
        if let Some(tid) = trace_id.as_ref() {
            Span::current().record("trace_id", tracing::field::display(tid));
        }

        Ok(CallerIdentityExtractor(CallerIdentity { user_id, trace_id }))
    }
}
