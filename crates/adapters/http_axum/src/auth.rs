//! Bearer-token authentication.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use formflow_app::ports::IdentityLookup;
use formflow_domain::error::FormflowError;
use formflow_domain::id::UserId;

use crate::error::ApiError;

/// Resolve the caller from `Authorization: Bearer <token>`.
///
/// # Errors
///
/// [`FormflowError::Unauthenticated`] when the header is missing, malformed
/// or names an unknown token.
pub async fn caller<I: IdentityLookup>(identity: &I, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(FormflowError::Unauthenticated)?;

    identity
        .authenticate(token.to_string())
        .await?
        .ok_or_else(|| FormflowError::Unauthenticated.into())
}
