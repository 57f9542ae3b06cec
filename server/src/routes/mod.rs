//! HTTP route handlers.

pub mod devices;
pub mod downloads;
pub mod entitlements;

use crate::error::ApiError;
use axum::http::HeaderMap;
use tonegate_types::UserId;

/// Extracts the authenticated subject from the `X-User-Id` header.
///
/// Authentication itself happens upstream; this server trusts the
/// header the gateway sets.
pub(crate) fn subject(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| UserId::parse(raw).ok())
        .ok_or(ApiError::MissingSubject)
}

/// First client address from `X-Forwarded-For`, when present.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
