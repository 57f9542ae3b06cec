//! The entitlement resolver.

use crate::error::{EntitlementError, EntitlementResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tonegate_store::{GrantRepository, SubscriptionRepository};
use tonegate_types::{
    AccessDecision, AccessPath, Grant, Plan, ResourceKind, ResourceRef, Subscription, UserId,
};

/// Resolves (user, resource) pairs to access decisions.
///
/// Holds repositories only; all state lives in the store. Resolution is
/// side-effect-free.
pub struct EntitlementResolver {
    grants: Arc<dyn GrantRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl EntitlementResolver {
    /// Creates a resolver over the given repositories.
    pub fn new(
        grants: Arc<dyn GrantRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            grants,
            subscriptions,
        }
    }

    /// Resolves access for the resource at the current time.
    pub fn resolve(
        &self,
        user_id: UserId,
        resource: &ResourceRef,
    ) -> EntitlementResult<AccessDecision> {
        self.resolve_at(user_id, resource, Utc::now())
    }

    /// Resolves access at an explicit point in time (test seam).
    pub fn resolve_at(
        &self,
        user_id: UserId,
        resource: &ResourceRef,
        now: DateTime<Utc>,
    ) -> EntitlementResult<AccessDecision> {
        let decision = match resource.kind {
            ResourceKind::MusicLibrary => self.resolve_library(user_id, now)?,
            ResourceKind::SingleProduct => self.resolve_product(user_id, resource, now)?,
            ResourceKind::TtsCategory => self.resolve_category(user_id, resource, now)?,
        };
        tracing::debug!(
            user = %user_id,
            resource = %resource,
            allowed = decision.allowed,
            "entitlement resolved"
        );
        Ok(decision)
    }

    /// The user's active subscription together with its plan, if any.
    fn subscribed_plan(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> EntitlementResult<Option<(Subscription, Plan)>> {
        let Some(subscription) = self.subscriptions.active_subscription(user_id, now)? else {
            return Ok(None);
        };
        let plan = self
            .subscriptions
            .find_plan(&subscription.plan_slug)?
            .ok_or_else(|| EntitlementError::UnknownPlan(subscription.plan_slug.clone()))?;
        Ok(Some((subscription, plan)))
    }

    fn resolve_library(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> EntitlementResult<AccessDecision> {
        // Subscription access is reported even when a lifetime grant also
        // exists: the subscription expiry is the more informative signal.
        if let Some((subscription, plan)) = self.subscribed_plan(user_id, now)? {
            if plan.includes_music_library {
                return Ok(AccessDecision::granted(
                    AccessPath::Subscription,
                    Some(subscription.ends_at),
                ));
            }
        }

        let grants = self
            .grants
            .grants_for_resource(user_id, &ResourceRef::music_library())?;
        if let Some(best) = best_grant(&grants, now) {
            return Ok(AccessDecision::granted(
                AccessPath::FullLibrary,
                best.expires_at,
            ));
        }

        Ok(AccessDecision::denied(
            "No music library access. Consider purchasing a subscription or individual tracks.",
        ))
    }

    fn resolve_product(
        &self,
        user_id: UserId,
        resource: &ResourceRef,
        now: DateTime<Utc>,
    ) -> EntitlementResult<AccessDecision> {
        // Library access implies every music product.
        let library = self.resolve_library(user_id, now)?;
        if library.allowed {
            return Ok(AccessDecision::granted(
                AccessPath::LibraryAccess,
                library.expires_at,
            ));
        }

        let grants = self.grants.grants_for_resource(user_id, resource)?;
        if let Some(best) = best_grant(&grants, now) {
            return Ok(AccessDecision::granted(
                AccessPath::IndividualPurchase,
                best.expires_at,
            ));
        }

        Ok(AccessDecision::denied(
            "This music track requires individual purchase or music library subscription.",
        ))
    }

    fn resolve_category(
        &self,
        user_id: UserId,
        resource: &ResourceRef,
        now: DateTime<Utc>,
    ) -> EntitlementResult<AccessDecision> {
        // No library-style shortcut for TTS; plan inclusion or a category
        // grant are the only paths.
        if let Some((subscription, plan)) = self.subscribed_plan(user_id, now)? {
            if plan.includes_tts_category(&resource.identifier) {
                return Ok(AccessDecision::granted(
                    AccessPath::CategoryAccess,
                    Some(subscription.ends_at),
                ));
            }
        }

        let grants = self.grants.grants_for_resource(user_id, resource)?;
        if let Some(best) = best_grant(&grants, now) {
            return Ok(AccessDecision::granted(
                AccessPath::CategoryAccess,
                best.expires_at,
            ));
        }

        Ok(AccessDecision::denied(format!(
            "Access to '{}' category requires individual purchase or subscription.",
            resource.identifier
        )))
    }
}

/// Picks the most permissive valid grant: latest expiry wins, and a
/// lifetime grant (no expiry) beats any dated one.
fn best_grant(grants: &[Grant], now: DateTime<Utc>) -> Option<&Grant> {
    grants
        .iter()
        .filter(|g| g.is_valid_at(now))
        .max_by_key(|g| match g.expires_at {
            None => (1, 0),
            Some(exp) => (0, exp.timestamp()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tonegate_types::AccessType;

    fn grant(expires_at: Option<DateTime<Utc>>, is_active: bool) -> Grant {
        Grant {
            user_id: UserId::new(),
            resource: ResourceRef::single_product("42"),
            access_type: AccessType::SinglePurchase,
            granted_at: Utc::now(),
            expires_at,
            purchase_reference: None,
            is_active,
        }
    }

    #[test]
    fn lifetime_beats_dated_expiry() {
        let now = Utc::now();
        let grants = vec![
            grant(Some(now + Duration::days(30)), true),
            grant(None, true),
            grant(Some(now + Duration::days(365)), true),
        ];
        let best = best_grant(&grants, now).unwrap();
        assert!(best.expires_at.is_none());
    }

    #[test]
    fn latest_dated_expiry_wins() {
        let now = Utc::now();
        let grants = vec![
            grant(Some(now + Duration::days(30)), true),
            grant(Some(now + Duration::days(365)), true),
        ];
        let best = best_grant(&grants, now).unwrap();
        assert_eq!(best.expires_at, Some(now + Duration::days(365)));
    }

    #[test]
    fn expired_and_inactive_are_ignored() {
        let now = Utc::now();
        let grants = vec![
            grant(Some(now - Duration::days(1)), true),
            grant(None, false),
        ];
        assert!(best_grant(&grants, now).is_none());
    }
}
