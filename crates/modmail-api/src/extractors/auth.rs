//! Ingress authentication extractor
//!
//! The messaging gateway authenticates with a shared bearer token
//! (`INGRESS_TOKEN`). Without a configured token every request is accepted.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::response::ApiError;
use crate::state::AppState;

/// Proof that the request came from the trusted gateway
#[derive(Debug, Clone, Copy)]
pub struct IngressAuth;

#[async_trait]
impl<S> FromRequestParts<S> for IngressAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let Some(expected) = app_state.config().api.ingress_token.as_deref() else {
            return Ok(IngressAuth);
        };

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::MissingAuth)?;

        if !constant_time_eq(bearer.token().as_bytes(), expected.as_bytes()) {
            tracing::warn!("Rejected ingress request with a wrong token");
            return Err(ApiError::InvalidToken);
        }

        Ok(IngressAuth)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
