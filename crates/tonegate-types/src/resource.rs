//! Resource references for entitlement resolution.
//!
//! A resource is either the whole music library, a single music product,
//! or a named TTS category. The kind is an enum so every resolver branch
//! is checked at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content identifier used by whole-library grants.
pub const MUSIC_LIBRARY_IDENTIFIER: &str = "all_music";

/// The kind of resource an access decision is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// The entire music library.
    MusicLibrary,
    /// One specific music product.
    SingleProduct,
    /// A named TTS content category.
    TtsCategory,
}

impl ResourceKind {
    /// Returns the stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MusicLibrary => "music_library",
            Self::SingleProduct => "single_product",
            Self::TtsCategory => "tts_category",
        }
    }

    /// Parses the stable string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "music_library" => Ok(Self::MusicLibrary),
            "single_product" => Ok(Self::SingleProduct),
            "tts_category" => Ok(Self::TtsCategory),
            other => Err(crate::Error::UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (kind, identifier) pair naming one resource.
///
/// The identifier is a product id for `SingleProduct`, a category name for
/// `TtsCategory`, and the fixed library identifier for `MusicLibrary`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// What kind of resource this names.
    pub kind: ResourceKind,
    /// The content identifier within that kind.
    pub identifier: String,
}

impl ResourceRef {
    /// The whole music library.
    #[must_use]
    pub fn music_library() -> Self {
        Self {
            kind: ResourceKind::MusicLibrary,
            identifier: MUSIC_LIBRARY_IDENTIFIER.to_string(),
        }
    }

    /// A single music product.
    #[must_use]
    pub fn single_product(product_id: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::SingleProduct,
            identifier: product_id.into(),
        }
    }

    /// A named TTS category.
    #[must_use]
    pub fn tts_category(category: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::TtsCategory,
            identifier: category.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.identifier)
    }
}
