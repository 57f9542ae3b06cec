//! Access decisions produced by the entitlement resolver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which rule satisfied an allowed decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPath {
    /// Library access through an active subscription.
    Subscription,
    /// Library access through a direct library grant.
    FullLibrary,
    /// Product access satisfied by library-wide access.
    LibraryAccess,
    /// Product access through a product-specific grant.
    IndividualPurchase,
    /// Category access through a category grant or plan inclusion.
    CategoryAccess,
}

/// The resolved yes/no access decision for a (user, resource) pair.
///
/// Denials carry a reason string structured enough to drive a "here's
/// what you need to buy" UI without revealing anyone else's grant state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessDecision {
    /// Whether access is allowed.
    pub allowed: bool,
    /// Which rule matched, when allowed.
    pub access_path: Option<AccessPath>,
    /// When the matched access expires; `None` means lifetime or unknown.
    pub expires_at: Option<DateTime<Utc>>,
    /// Why access was denied, when it was.
    pub reason: Option<String>,
}

impl AccessDecision {
    /// An allowed decision via the given path.
    #[must_use]
    pub fn granted(path: AccessPath, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            allowed: true,
            access_path: Some(path),
            expires_at,
            reason: None,
        }
    }

    /// A denied decision with a user-facing reason.
    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            access_path: None,
            expires_at: None,
            reason: Some(reason.into()),
        }
    }
}
