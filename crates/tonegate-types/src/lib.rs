//! Core type definitions for Tonegate.
//!
//! This crate defines the fundamental types shared by the entitlement and
//! delivery engine:
//! - User and download identifiers (UUID v7)
//! - Resource references (music library, single product, TTS category)
//! - Grants, subscriptions, plans, devices, and download records
//! - Access decisions produced by the entitlement resolver
//!
//! Catalog administration, payments, and speech generation are external
//! collaborators; their types do not belong here.

mod decision;
mod device;
mod download;
mod grant;
mod ids;
mod resource;
mod subscription;

pub use decision::{AccessDecision, AccessPath};
pub use device::{Device, DeviceMetadata, DEFAULT_DEVICE_LIMIT};
pub use download::{DownloadRecord, DownloadTarget, MediaItem};
pub use grant::{AccessType, Grant};
pub use ids::{DownloadId, UserId};
pub use resource::{ResourceKind, ResourceRef, MUSIC_LIBRARY_IDENTIFIER};
pub use subscription::{Plan, Subscription, SubscriptionStatus};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown variant: {0}")]
    UnknownVariant(String),
}
