//! Download request, redemption, and completion handlers.

use crate::error::{ApiError, ApiResult};
use crate::routes::subject;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tonegate_delivery::stream_chunks;
use tonegate_types::{DownloadId, DownloadRecord, DownloadTarget};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RequestBody {
    pub target: DownloadTarget,
    #[serde(default)]
    pub device_uuid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestResponse {
    pub download_id: DownloadId,
    pub url: String,
    pub expires_at: i64,
    pub slug: String,
    pub bytes: u64,
    pub sha256: String,
}

/// `POST /api/v1/downloads/request`
///
/// Runs the full entitlement check, records a pending download, and
/// hands back a signed time-boxed redemption URL.
pub async fn request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RequestBody>,
) -> ApiResult<Json<RequestResponse>> {
    let user = subject(&headers)?;

    let item = state
        .catalog
        .find_media_item(&body.target)?
        .ok_or_else(|| ApiError::NotFound(format!("unknown product {}", body.target.product_id())))?;
    let resource = item
        .entitlement_resource()
        .ok_or_else(|| ApiError::ResourceMissing(format!("no category for {}", item.slug)))?;

    let decision = state.resolver.resolve(user, &resource)?;
    if !decision.allowed {
        let reason = decision
            .reason
            .unwrap_or_else(|| "access denied".to_string());
        return Err(ApiError::AccessDenied(reason));
    }

    // Size and checksum come from the plaintext; a missing vault file
    // fails here, before any ticket is issued.
    let plaintext = state.vault.load(&item.encrypted_path).await?;
    let sha256 = format!("{:x}", Sha256::digest(&plaintext));
    let bytes = plaintext.len() as u64;

    let record = DownloadRecord {
        id: DownloadId::new(),
        user_id: user,
        target: body.target,
        device_uuid: body.device_uuid,
        bytes: Some(bytes),
        sha256: Some(sha256.clone()),
        completed: false,
        completed_at: None,
        requested_at: Utc::now(),
    };
    state.downloads.insert_download(&record)?;

    let ticket = state.tickets.issue(record.id.to_string(), state.ticket_ttl);
    info!(user = %user, download = %record.id, slug = %item.slug, "download ticket issued");

    Ok(Json(RequestResponse {
        download_id: record.id,
        url: format!(
            "/api/v1/downloads/{}?expires={}&signature={}",
            record.id, ticket.expires_at, ticket.signature
        ),
        expires_at: ticket.expires_at,
        slug: item.slug,
        bytes,
        sha256,
    }))
}

/// Ticket fields arrive as loose strings so that a stripped or
/// mangled query is still our 401, never the extractor's 400.
#[derive(Debug, Deserialize)]
pub struct RedeemQuery {
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// `GET /api/v1/downloads/{id}?expires=…&signature=…`
///
/// Verifies the ticket, checks ownership, and streams the decrypted
/// media in paced chunks. The delivery mode is decided here and never
/// changes mid-stream.
pub async fn redeem(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RedeemQuery>,
    headers: HeaderMap,
) -> ApiResult<Response<Body>> {
    let user = subject(&headers)?;

    let expires: i64 = query
        .expires
        .as_deref()
        .and_then(|v| v.parse().ok())
        .ok_or(ApiError::InvalidTicket)?;
    let signature = query.signature.ok_or(ApiError::InvalidTicket)?;

    state.tickets.verify(&id, expires, &signature)?;
    // A verified id was signed by us, so a parse failure means a ticket
    // for something that was never a download id.
    let id = DownloadId::parse(&id).map_err(|_| ApiError::InvalidTicket)?;

    let record = state
        .downloads
        .find_download(id)?
        .ok_or_else(|| ApiError::NotFound(format!("download {id}")))?;
    if record.user_id != user {
        return Err(ApiError::AccessDenied(
            "this download was issued to a different account".to_string(),
        ));
    }

    let item = state
        .catalog
        .find_media_item(&record.target)?
        .ok_or_else(|| {
            ApiError::ResourceMissing(format!("catalog entry for {}", record.target.product_id()))
        })?;

    // Full decrypt before any response bytes; a missing or corrupt file
    // becomes a clean 404 instead of a truncated body.
    let plaintext = state.vault.load(&item.encrypted_path).await?;

    let active = state.load.record_start();
    let mode = state.delivery.mode_for(active);
    info!(
        user = %user,
        download = %id,
        bytes = plaintext.len(),
        active,
        mode = mode.as_str(),
        "stream starting"
    );

    let length = plaintext.len();
    let body = Body::from_stream(stream_chunks(plaintext, &state.delivery, mode));
    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", item.slug),
        )
        .header("x-download-mode", mode.as_str())
        .body(body)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    pub download_id: DownloadId,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub device_uuid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub download_id: DownloadId,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// `POST /api/v1/downloads/complete`
///
/// Idempotent: reported fields are last-write-wins, but the first
/// completion time sticks.
pub async fn complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CompleteBody>,
) -> ApiResult<Json<CompleteResponse>> {
    let user = subject(&headers)?;

    let record = state
        .downloads
        .find_download(body.download_id)?
        .ok_or_else(|| ApiError::NotFound(format!("download {}", body.download_id)))?;
    if record.user_id != user {
        return Err(ApiError::AccessDenied(
            "this download was issued to a different account".to_string(),
        ));
    }

    let updated = state.downloads.complete_download(
        body.download_id,
        body.bytes,
        body.sha256,
        body.device_uuid,
        Utc::now(),
    )?;

    Ok(Json(CompleteResponse {
        download_id: updated.id,
        completed: updated.completed,
        completed_at: updated.completed_at,
    }))
}
