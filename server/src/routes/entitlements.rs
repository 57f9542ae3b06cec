//! Entitlement summary handler.

use crate::error::ApiResult;
use crate::routes::subject;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tonegate_entitlements::AccessSummary;

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub access: AccessSummary,
    pub devices: DeviceSummary,
}

#[derive(Debug, Serialize)]
pub struct DeviceSummary {
    pub registered: u32,
    pub limit: u32,
}

/// `GET /api/v1/entitlements/summary`
///
/// Music and TTS access rolled up against the catalog's category list,
/// plus the device slot usage.
pub async fn summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SummaryResponse>> {
    let user = subject(&headers)?;
    let categories = state.catalog.list_tts_categories()?;
    let access = state.resolver.access_summary(user, &categories)?;
    let registered = state.registry.count(user)?;

    Ok(Json(SummaryResponse {
        access,
        devices: DeviceSummary {
            registered,
            limit: state.registry.limit(),
        },
    }))
}
