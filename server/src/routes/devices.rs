//! Device registration, heartbeat, and revocation handlers.

use crate::error::{ApiError, ApiResult};
use crate::routes::{client_ip, subject};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tonegate_types::DeviceMetadata;

#[derive(Debug, Deserialize)]
pub struct DeviceBody {
    pub device_uuid: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub device_uuid: String,
    pub platform: Option<String>,
    pub model: Option<String>,
    pub app_version: Option<String>,
    pub last_seen_at: DateTime<Utc>,
    pub registered: u32,
    pub limit: u32,
}

fn metadata(body: &DeviceBody, headers: &HeaderMap) -> DeviceMetadata {
    DeviceMetadata {
        platform: body.platform.clone(),
        model: body.model.clone(),
        app_version: body.app_version.clone(),
        ip: client_ip(headers),
    }
}

/// `POST /api/v1/devices/register`
///
/// Idempotent for an already-registered device; 409 when the user is
/// at their limit.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DeviceBody>,
) -> ApiResult<Json<DeviceResponse>> {
    let user = subject(&headers)?;
    if body.device_uuid.trim().is_empty() {
        return Err(ApiError::BadRequest("device_uuid must not be empty".to_string()));
    }

    let meta = metadata(&body, &headers);
    let device = state.registry.register(user, &body.device_uuid, meta)?;
    let registered = state.registry.count(user)?;

    Ok(Json(DeviceResponse {
        device_uuid: device.device_uuid,
        platform: device.platform,
        model: device.model,
        app_version: device.app_version,
        last_seen_at: device.last_seen_at,
        registered,
        limit: state.registry.limit(),
    }))
}

/// `POST /api/v1/devices/heartbeat`
///
/// Stamps `last_seen_at` on a registered device. Unknown devices get a
/// 404; a heartbeat never registers.
pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DeviceBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = subject(&headers)?;
    let meta = metadata(&body, &headers);
    if !state.registry.heartbeat(user, &body.device_uuid, meta)? {
        return Err(ApiError::NotFound(format!(
            "device {} is not registered",
            body.device_uuid
        )));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `DELETE /api/v1/devices/{uuid}`
///
/// Frees the device slot immediately.
pub async fn revoke(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let user = subject(&headers)?;
    if !state.registry.revoke(user, &uuid)? {
        return Err(ApiError::NotFound(format!("device {uuid} is not registered")));
    }
    Ok(StatusCode::NO_CONTENT)
}
