//! Bearer-token principal extraction.
//!
//! Flow Overview: read the `Authorization: Bearer` header, resolve the access
//! token through the session facade, and hand the identity to the handler.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::{AuthError, Identity, SessionFacade};

/// Resolve the bearer access token into an identity.
///
/// # Errors
/// Returns `AuthError::InvalidToken` when the header is missing or malformed,
/// otherwise whatever token resolution fails with.
pub fn require_auth(headers: &HeaderMap, facade: &SessionFacade) -> Result<Identity, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::InvalidToken)?;
    facade.resolve_current_user(&token)
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Extract a client IP for logging from common proxy headers.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
