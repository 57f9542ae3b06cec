//! Shared builders for store tests.

use chrono::{DateTime, Utc};
use tonegate_types::{AccessType, Grant, Plan, ResourceRef, Subscription, SubscriptionStatus, UserId};

pub fn product_grant(user: UserId, id: &str, expires_at: Option<DateTime<Utc>>) -> Grant {
    Grant {
        user_id: user,
        resource: ResourceRef::single_product(id),
        access_type: AccessType::SinglePurchase,
        granted_at: Utc::now(),
        expires_at,
        purchase_reference: Some("order-77".to_string()),
        is_active: true,
    }
}

pub fn category_grant(user: UserId, category: &str, expires_at: Option<DateTime<Utc>>) -> Grant {
    Grant {
        user_id: user,
        resource: ResourceRef::tts_category(category),
        access_type: AccessType::CategoryPurchase,
        granted_at: Utc::now(),
        expires_at,
        purchase_reference: None,
        is_active: true,
    }
}

pub fn plan_with_library(slug: &str) -> Plan {
    Plan {
        slug: slug.to_string(),
        name: slug.to_string(),
        includes_music_library: true,
        includes_all_tts_categories: false,
        included_tts_categories: vec!["bedtime".to_string()],
    }
}

pub fn active_subscription(user: UserId, plan_slug: &str, reference: &str) -> Subscription {
    Subscription {
        user_id: user,
        plan_slug: plan_slug.to_string(),
        status: SubscriptionStatus::Active,
        starts_at: Utc::now() - chrono::Duration::days(1),
        ends_at: Utc::now() + chrono::Duration::days(30),
        auto_renew: true,
        reference: reference.to_string(),
    }
}
