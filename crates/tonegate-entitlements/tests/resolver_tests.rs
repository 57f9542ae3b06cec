//! Resolver behavior over an in-memory store.

use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tonegate_entitlements::EntitlementResolver;
use tonegate_store::{GrantRepository, MemoryStore, SubscriptionRepository};
use tonegate_types::{
    AccessPath, AccessType, Grant, Plan, ResourceRef, Subscription, SubscriptionStatus, UserId,
};

fn resolver(store: &Arc<MemoryStore>) -> EntitlementResolver {
    EntitlementResolver::new(store.clone(), store.clone())
}

fn grant(
    user: UserId,
    resource: ResourceRef,
    access_type: AccessType,
    expires_at: Option<DateTime<Utc>>,
) -> Grant {
    Grant {
        user_id: user,
        resource,
        access_type,
        granted_at: Utc::now() - Duration::days(1),
        expires_at,
        purchase_reference: None,
        is_active: true,
    }
}

fn premium_plan() -> Plan {
    Plan {
        slug: "premium".to_string(),
        name: "Premium".to_string(),
        includes_music_library: true,
        includes_all_tts_categories: false,
        included_tts_categories: vec!["bedtime".to_string()],
    }
}

fn subscribe(store: &MemoryStore, user: UserId, plan: &Plan, ends_at: DateTime<Utc>) {
    store.upsert_plan(plan).unwrap();
    store
        .upsert_subscription(&Subscription {
            user_id: user,
            plan_slug: plan.slug.clone(),
            status: SubscriptionStatus::Active,
            starts_at: Utc::now() - Duration::days(1),
            ends_at,
            auto_renew: true,
            reference: "sub-1".to_string(),
        })
        .unwrap();
}

// ── Music library ────────────────────────────────────────────────────────

#[test]
fn no_access_is_denied_with_purchase_hint() {
    let store = Arc::new(MemoryStore::new());
    let decision = resolver(&store)
        .resolve(UserId::new(), &ResourceRef::music_library())
        .unwrap();
    assert!(!decision.allowed);
    assert!(decision.reason.unwrap().contains("subscription"));
}

#[test]
fn subscription_opens_the_library() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    let ends_at = Utc::now() + Duration::days(30);
    subscribe(&store, user, &premium_plan(), ends_at);

    let decision = resolver(&store)
        .resolve(user, &ResourceRef::music_library())
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.access_path, Some(AccessPath::Subscription));
    assert_eq!(decision.expires_at, Some(ends_at));
}

#[test]
fn subscription_reported_over_coexisting_lifetime_grant() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    let ends_at = Utc::now() + Duration::days(30);
    subscribe(&store, user, &premium_plan(), ends_at);
    store
        .insert_grant(&grant(
            user,
            ResourceRef::music_library(),
            AccessType::SinglePurchase,
            None,
        ))
        .unwrap();

    let decision = resolver(&store)
        .resolve(user, &ResourceRef::music_library())
        .unwrap();
    // The subscription path wins the report; its expiry is the signal
    // clients act on.
    assert_eq!(decision.access_path, Some(AccessPath::Subscription));
    assert_eq!(decision.expires_at, Some(ends_at));
}

#[test]
fn library_grant_without_subscription_is_full_library() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    store
        .insert_grant(&grant(
            user,
            ResourceRef::music_library(),
            AccessType::SinglePurchase,
            None,
        ))
        .unwrap();

    let decision = resolver(&store)
        .resolve(user, &ResourceRef::music_library())
        .unwrap();
    assert_eq!(decision.access_path, Some(AccessPath::FullLibrary));
    assert_eq!(decision.expires_at, None);
}

// ── Single products ──────────────────────────────────────────────────────

#[test]
fn lifetime_purchase_is_individual_access_forever() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    store
        .insert_grant(&grant(
            user,
            ResourceRef::single_product("42"),
            AccessType::SinglePurchase,
            None,
        ))
        .unwrap();

    let far_future = Utc::now() + Duration::days(365 * 10);
    let decision = resolver(&store)
        .resolve_at(user, &ResourceRef::single_product("42"), far_future)
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.access_path, Some(AccessPath::IndividualPurchase));
    assert_eq!(decision.expires_at, None);
}

#[test]
fn library_access_implies_every_product() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    subscribe(&store, user, &premium_plan(), Utc::now() + Duration::days(30));

    let decision = resolver(&store)
        .resolve(user, &ResourceRef::single_product("any-product"))
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.access_path, Some(AccessPath::LibraryAccess));
}

#[test]
fn expired_grant_is_denied_even_while_flagged_active() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    // The sweep has not run; is_active is still true.
    store
        .insert_grant(&grant(
            user,
            ResourceRef::single_product("42"),
            AccessType::SinglePurchase,
            Some(Utc::now() - Duration::seconds(1)),
        ))
        .unwrap();

    let decision = resolver(&store)
        .resolve(user, &ResourceRef::single_product("42"))
        .unwrap();
    assert!(!decision.allowed);
}

#[test]
fn inactive_grant_is_denied_even_before_expiry() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    let mut g = grant(
        user,
        ResourceRef::single_product("42"),
        AccessType::SinglePurchase,
        Some(Utc::now() + Duration::days(30)),
    );
    g.is_active = false;
    store.insert_grant(&g).unwrap();

    let decision = resolver(&store)
        .resolve(user, &ResourceRef::single_product("42"))
        .unwrap();
    assert!(!decision.allowed);
}

#[test]
fn most_permissive_grant_wins_the_report() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    let near = Utc::now() + Duration::days(7);
    let far = Utc::now() + Duration::days(365);
    for expires in [Some(near), Some(far)] {
        store
            .insert_grant(&grant(
                user,
                ResourceRef::single_product("42"),
                AccessType::SinglePurchase,
                expires,
            ))
            .unwrap();
    }

    let decision = resolver(&store)
        .resolve(user, &ResourceRef::single_product("42"))
        .unwrap();
    assert_eq!(decision.expires_at, Some(far));
}

// ── TTS categories ───────────────────────────────────────────────────────

#[test]
fn plan_with_all_categories_allows_any_category() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    let plan = Plan {
        includes_all_tts_categories: true,
        included_tts_categories: vec![],
        ..premium_plan()
    };
    subscribe(&store, user, &plan, Utc::now() + Duration::days(30));

    let decision = resolver(&store)
        .resolve(user, &ResourceRef::tts_category("anything-at-all"))
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.access_path, Some(AccessPath::CategoryAccess));
}

#[test]
fn plan_category_list_is_exact() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    subscribe(&store, user, &premium_plan(), Utc::now() + Duration::days(30));

    let allowed = resolver(&store)
        .resolve(user, &ResourceRef::tts_category("bedtime"))
        .unwrap();
    assert!(allowed.allowed);

    let denied = resolver(&store)
        .resolve(user, &ResourceRef::tts_category("news"))
        .unwrap();
    assert!(!denied.allowed);
    assert!(denied.reason.unwrap().contains("news"));
}

#[test]
fn library_access_does_not_shortcut_tts() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    store
        .insert_grant(&grant(
            user,
            ResourceRef::music_library(),
            AccessType::SinglePurchase,
            None,
        ))
        .unwrap();

    let decision = resolver(&store)
        .resolve(user, &ResourceRef::tts_category("bedtime"))
        .unwrap();
    assert!(!decision.allowed);
}

#[test]
fn revoked_subscription_closes_category_access() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    let plan = premium_plan();
    store
        .grant_subscription_access(
            user,
            &plan,
            &plan.included_tts_categories,
            Utc::now() + Duration::days(30),
            "sub-1",
        )
        .unwrap();

    let before = resolver(&store)
        .resolve(user, &ResourceRef::tts_category("bedtime"))
        .unwrap();
    assert!(before.allowed);

    store.revoke_by_subscription(user, "sub-1").unwrap();
    let after = resolver(&store)
        .resolve(user, &ResourceRef::tts_category("bedtime"))
        .unwrap();
    assert!(!after.allowed);
}

// ── Summary ──────────────────────────────────────────────────────────────

#[test]
fn summary_rolls_up_music_and_categories() {
    let store = Arc::new(MemoryStore::new());
    let user = UserId::new();
    subscribe(&store, user, &premium_plan(), Utc::now() + Duration::days(30));

    let all = vec!["bedtime".to_string(), "news".to_string()];
    let summary = resolver(&store).access_summary(user, &all).unwrap();
    assert!(summary.music.has_full_access);
    assert!(summary.music.subscription_access);
    assert_eq!(summary.tts.accessible_categories, vec!["bedtime"]);
    assert_eq!(summary.tts.total_accessible, 1);
    assert_eq!(summary.tts.total_available, 2);
}

#[test]
fn summary_for_unknown_user_is_empty() {
    let store = Arc::new(MemoryStore::new());
    let all = vec!["bedtime".to_string()];
    let summary = resolver(&store).access_summary(UserId::new(), &all).unwrap();
    assert!(!summary.music.has_full_access);
    assert!(summary.tts.accessible_categories.is_empty());
}
