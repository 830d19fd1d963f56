//! Caller identity extractor.
//!
//! The service does not authenticate anyone itself: the bearer token sent by
//! the browser is handed to the hosted backend, whose row-level policies decide
//! what the caller may read or change.

use crate::services::AccessToken;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use service_core::error::AppError;

/// Bearer token of the signed-in user, forwarded on every backend call.
#[derive(Debug, Clone)]
pub struct CallerToken(pub AccessToken);

#[async_trait]
impl<S> FromRequestParts<S> for CallerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing Authorization header")))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Authorization must be a Bearer token"))
            })?;

        Ok(CallerToken(AccessToken::new(token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    async fn extract(header: Option<&str>) -> Result<CallerToken, AppError> {
        let mut builder = Request::builder().uri("/payments");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CallerToken::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn bearer_token_is_extracted() {
        let CallerToken(token) = extract(Some("Bearer eyJhbGciOi.abc")).await.unwrap();
        assert_eq!(token.expose(), "eyJhbGciOi.abc");
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_401() {
        for header in [None, Some("Basic dXNlcjpwYXNz"), Some("Bearer   ")] {
            let err = extract(header).await.unwrap_err();
            assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        }
    }
}
