//! Per-user access summaries for the entitlements endpoint.

use crate::error::EntitlementResult;
use crate::resolver::EntitlementResolver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tonegate_types::{AccessPath, ResourceRef, UserId};

/// Music library portion of the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicAccessSummary {
    /// Whether the user can play anything in the library.
    pub has_full_access: bool,
    /// True when that access comes from a subscription.
    pub subscription_access: bool,
    /// When the access expires, if it does.
    pub access_expires_at: Option<DateTime<Utc>>,
}

/// TTS portion of the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsAccessSummary {
    /// Categories the user can access right now.
    pub accessible_categories: Vec<String>,
    /// Count of accessible categories.
    pub total_accessible: usize,
    /// Count of categories in the catalog.
    pub total_available: usize,
}

/// Complete access summary for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessSummary {
    pub music: MusicAccessSummary,
    pub tts: TtsAccessSummary,
}

impl EntitlementResolver {
    /// Builds the user's access summary against the catalog's category
    /// list at the current time.
    pub fn access_summary(
        &self,
        user_id: UserId,
        all_categories: &[String],
    ) -> EntitlementResult<AccessSummary> {
        self.access_summary_at(user_id, all_categories, Utc::now())
    }

    /// Builds the access summary at an explicit point in time.
    pub fn access_summary_at(
        &self,
        user_id: UserId,
        all_categories: &[String],
        now: DateTime<Utc>,
    ) -> EntitlementResult<AccessSummary> {
        let library = self.resolve_at(user_id, &ResourceRef::music_library(), now)?;

        let mut accessible = Vec::new();
        for category in all_categories {
            let decision =
                self.resolve_at(user_id, &ResourceRef::tts_category(category.clone()), now)?;
            if decision.allowed {
                accessible.push(category.clone());
            }
        }

        Ok(AccessSummary {
            music: MusicAccessSummary {
                has_full_access: library.allowed,
                subscription_access: library.access_path == Some(AccessPath::Subscription),
                access_expires_at: library.expires_at,
            },
            tts: TtsAccessSummary {
                total_accessible: accessible.len(),
                accessible_categories: accessible,
                total_available: all_categories.len(),
            },
        })
    }
}
