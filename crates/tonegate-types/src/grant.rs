//! Access grants: persisted records asserting a user may access content.
//!
//! Grants are created on purchase or subscription fulfillment, flipped
//! inactive on revocation or by the expiry sweep, and never hard-deleted.

use crate::{ResourceRef, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a grant was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    /// Granted by an active subscription; revoked when it ends.
    Subscription,
    /// One-off purchase of a single item.
    SinglePurchase,
    /// Purchase of a whole category.
    CategoryPurchase,
}

impl AccessType {
    /// Returns the stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::SinglePurchase => "single_purchase",
            Self::CategoryPurchase => "category_purchase",
        }
    }

    /// Parses the stable string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "subscription" => Ok(Self::Subscription),
            "single_purchase" => Ok(Self::SinglePurchase),
            "category_purchase" => Ok(Self::CategoryPurchase),
            other => Err(crate::Error::UnknownVariant(other.to_string())),
        }
    }
}

/// A persisted access right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    /// The user this grant belongs to.
    pub user_id: UserId,
    /// What the grant covers.
    pub resource: ResourceRef,
    /// How it was obtained.
    pub access_type: AccessType,
    /// When it was granted.
    pub granted_at: DateTime<Utc>,
    /// When it expires; `None` means lifetime access.
    pub expires_at: Option<DateTime<Utc>>,
    /// Order or subscription reference that produced this grant.
    pub purchase_reference: Option<String>,
    /// Cleared on revocation instead of deleting the row (auditability).
    pub is_active: bool,
}

impl Grant {
    /// Returns true if the grant is active and unexpired at `now`.
    ///
    /// Expiry is compared here rather than trusting the background sweep,
    /// so a stale `is_active` flag never extends access.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }

    /// Returns true if the grant has a past expiry timestamp at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}
