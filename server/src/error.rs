//! API error responses.
//!
//! Every handler error maps to one JSON body with a stable `error` code.
//! Ticket failures collapse into a single 401 so a client cannot tell a
//! forged signature from an expired one.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tonegate_devices::DeviceError;
use tonegate_entitlements::EntitlementError;
use tonegate_store::StorageError;
use tonegate_tickets::TicketError;
use tracing::error;

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Handler-level errors with their HTTP mapping.
#[derive(Debug)]
pub enum ApiError {
    /// Entitlement denied; the reason doubles as a purchase hint.
    AccessDenied(String),
    /// Missing or unparseable `X-User-Id` header.
    MissingSubject,
    /// Bad, expired, or unknown download ticket.
    InvalidTicket,
    /// Known id but the record does not exist (or belongs to nobody).
    NotFound(String),
    /// Catalog or vault inconsistency; a file we promised is gone.
    ResourceMissing(String),
    /// The user is at their device limit.
    DeviceLimitReached { current: u32, limit: u32 },
    /// Request body or parameters cannot be used.
    BadRequest(String),
    /// A dependency the engine needs is unavailable.
    UpstreamUnavailable(String),
    /// Anything else.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::AccessDenied(reason) => (
                StatusCode::FORBIDDEN,
                json!({ "error": "access_denied", "message": reason }),
            ),
            ApiError::MissingSubject => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "unauthenticated", "message": "missing or invalid X-User-Id header" }),
            ),
            ApiError::InvalidTicket => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "invalid_ticket", "message": "download link is invalid or expired" }),
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "not_found", "message": what }),
            ),
            ApiError::ResourceMissing(what) => {
                // A catalog entry points at a vault file that is gone.
                // Someone needs to look at this.
                error!(resource = %what, "media resource missing");
                (
                    StatusCode::NOT_FOUND,
                    json!({ "error": "resource_missing", "message": "media file unavailable" }),
                )
            }
            ApiError::DeviceLimitReached { current, limit } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "device_limit_reached",
                    "message": format!("device limit reached ({current}/{limit})"),
                    "current": current,
                    "limit": limit,
                }),
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "bad_request", "message": message }),
            ),
            ApiError::UpstreamUnavailable(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "upstream_unavailable", "message": what }),
            ),
            ApiError::Internal(message) => {
                error!(message = %message, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal", "message": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EntitlementError> for ApiError {
    fn from(err: EntitlementError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DeviceError> for ApiError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::LimitReached { current, limit } => {
                ApiError::DeviceLimitReached { current, limit }
            }
            DeviceError::Storage(e) => ApiError::from(e),
        }
    }
}

impl From<TicketError> for ApiError {
    fn from(_: TicketError) -> Self {
        // Forged, expired, and unknown all look the same to the client.
        ApiError::InvalidTicket
    }
}

impl From<tonegate_delivery::DeliveryError> for ApiError {
    fn from(err: tonegate_delivery::DeliveryError) -> Self {
        match err {
            tonegate_delivery::DeliveryError::NotFound(path) => ApiError::ResourceMissing(path),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
