//! Download records and the media catalog entries they point at.

use crate::{DownloadId, ResourceRef, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The concrete asset a download is for.
///
/// Music products resolve entitlement as `single_product`; TTS products
/// resolve through their category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum DownloadTarget {
    /// A music product by id.
    MusicProduct(String),
    /// A generated-speech product by id.
    TtsProduct(String),
}

impl DownloadTarget {
    /// Returns the product identifier.
    #[must_use]
    pub fn product_id(&self) -> &str {
        match self {
            Self::MusicProduct(id) | Self::TtsProduct(id) => id,
        }
    }
}

/// A catalog entry mapping a product to its encrypted media file.
///
/// The catalog itself is administered elsewhere; the engine only reads
/// the fields it needs to resolve entitlement and locate the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// The product this entry describes.
    pub target: DownloadTarget,
    /// URL-safe name used in download filenames.
    pub slug: String,
    /// Opaque path of the encrypted file inside the media vault.
    pub encrypted_path: String,
    /// Category name for TTS products; `None` for music.
    pub tts_category: Option<String>,
}

impl MediaItem {
    /// The resource the entitlement resolver must approve for this item.
    ///
    /// TTS products have no library-style shortcut; they resolve through
    /// their category.
    #[must_use]
    pub fn entitlement_resource(&self) -> Option<ResourceRef> {
        match &self.target {
            DownloadTarget::MusicProduct(id) => Some(ResourceRef::single_product(id.clone())),
            DownloadTarget::TtsProduct(_) => self
                .tts_category
                .as_ref()
                .map(|c| ResourceRef::tts_category(c.clone())),
        }
    }
}

/// Audit record for one issued download.
///
/// Created pending when a ticket is issued, marked completed by the
/// client's completion call. Used for audit, never for access decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Record id, also the redemption path segment.
    pub id: DownloadId,
    /// The user the ticket was issued to.
    pub user_id: UserId,
    /// What was downloaded.
    pub target: DownloadTarget,
    /// Device that requested the download, if reported.
    pub device_uuid: Option<String>,
    /// File size in bytes, when known at issue time.
    pub bytes: Option<u64>,
    /// SHA-256 of the plaintext, when known at issue time.
    pub sha256: Option<String>,
    /// Whether the client reported completion.
    pub completed: bool,
    /// First completion time; re-completion does not move it.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the ticket was issued.
    pub requested_at: DateTime<Utc>,
}
