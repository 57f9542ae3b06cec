//! Subscriptions and plans.
//!
//! A subscription drives bulk grant creation when it starts and bulk
//! revocation when it ends. The plan declares what the subscription
//! includes: the music library, every TTS category, or a named list.

use crate::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Currently active.
    Active,
    /// Cancelled by the user; no longer grants access.
    Cancelled,
    /// Ran past its end date.
    Expired,
}

impl SubscriptionStatus {
    /// Returns the stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Parses the stable string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(crate::Error::UnknownVariant(other.to_string())),
        }
    }
}

/// One subscription period for a user.
///
/// Read-only after cancellation or expiry; renewal creates a new period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// The subscribing user.
    pub user_id: UserId,
    /// Slug of the plan this subscription is on.
    pub plan_slug: String,
    /// Lifecycle status.
    pub status: SubscriptionStatus,
    /// Period start.
    pub starts_at: DateTime<Utc>,
    /// Period end.
    pub ends_at: DateTime<Utc>,
    /// Whether the billing provider will renew this period.
    pub auto_renew: bool,
    /// Billing provider reference, shared with the grants it fanned out to.
    pub reference: String,
}

impl Subscription {
    /// Returns true if the subscription confers access at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.ends_at > now
    }
}

/// What a subscription plan includes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Stable plan identifier.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Whether the plan covers the whole music library.
    pub includes_music_library: bool,
    /// Whether the plan covers every TTS category.
    pub includes_all_tts_categories: bool,
    /// Named TTS categories included when not covering all of them.
    pub included_tts_categories: Vec<String>,
}

impl Plan {
    /// Returns true if this plan covers the named TTS category.
    #[must_use]
    pub fn includes_tts_category(&self, category: &str) -> bool {
        self.includes_all_tts_categories
            || self.included_tts_categories.iter().any(|c| c == category)
    }
}
