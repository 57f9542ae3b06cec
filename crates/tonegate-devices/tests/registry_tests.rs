//! Device registry behavior, including the racing-registration case.

use std::sync::Arc;
use tonegate_devices::{DeviceError, DeviceRegistry};
use tonegate_store::MemoryStore;
use tonegate_types::{DeviceMetadata, UserId};

fn registry(limit: u32) -> DeviceRegistry {
    DeviceRegistry::new(Arc::new(MemoryStore::new()), limit)
}

fn meta(platform: &str) -> DeviceMetadata {
    DeviceMetadata {
        platform: Some(platform.to_string()),
        ..DeviceMetadata::default()
    }
}

// ── Registration ─────────────────────────────────────────────────────────

#[test]
fn registration_up_to_the_limit_then_conflict() {
    let registry = registry(2);
    let user = UserId::new();

    registry.register(user, "dev-1", meta("ios")).unwrap();
    registry.register(user, "dev-2", meta("android")).unwrap();

    let err = registry.register(user, "dev-3", meta("web")).unwrap_err();
    match err {
        DeviceError::LimitReached { current, limit } => {
            assert_eq!(current, 2);
            assert_eq!(limit, 2);
        }
        other => panic!("expected LimitReached, got {other:?}"),
    }
}

#[test]
fn re_registration_is_idempotent_at_the_limit() {
    let registry = registry(2);
    let user = UserId::new();
    registry.register(user, "dev-1", meta("ios")).unwrap();
    registry.register(user, "dev-2", meta("android")).unwrap();

    // Same device again: allowed, count unchanged.
    registry.register(user, "dev-1", meta("ios")).unwrap();
    assert_eq!(registry.count(user).unwrap(), 2);
    assert!(registry.can_register(user, "dev-1").unwrap());
    assert!(!registry.can_register(user, "dev-3").unwrap());
}

#[test]
fn re_registration_keeps_metadata_the_update_omits() {
    let registry = registry(2);
    let user = UserId::new();
    registry
        .register(
            user,
            "dev-1",
            DeviceMetadata {
                platform: Some("ios".to_string()),
                app_version: Some("1.0".to_string()),
                ..DeviceMetadata::default()
            },
        )
        .unwrap();

    let device = registry
        .register(
            user,
            "dev-1",
            DeviceMetadata {
                app_version: Some("2.0".to_string()),
                ..DeviceMetadata::default()
            },
        )
        .unwrap();
    assert_eq!(device.platform.as_deref(), Some("ios"));
    assert_eq!(device.app_version.as_deref(), Some("2.0"));
}

#[test]
fn limits_are_per_user() {
    let registry = registry(1);
    let alice = UserId::new();
    let bob = UserId::new();
    registry.register(alice, "dev-1", meta("ios")).unwrap();
    registry.register(bob, "dev-1", meta("ios")).unwrap();
    assert_eq!(registry.count(alice).unwrap(), 1);
    assert_eq!(registry.count(bob).unwrap(), 1);
}

#[test]
fn racing_registrations_never_exceed_the_limit() {
    let registry = Arc::new(registry(2));
    let user = UserId::new();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                registry.register(user, &format!("dev-{i}"), DeviceMetadata::default())
            })
        })
        .collect();

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => wins += 1,
            Err(DeviceError::LimitReached { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(wins, 2);
    assert_eq!(conflicts, 6);
    assert_eq!(registry.count(user).unwrap(), 2);
}

// ── Heartbeat and revocation ─────────────────────────────────────────────

#[test]
fn heartbeat_touches_but_never_registers() {
    let registry = registry(2);
    let user = UserId::new();

    assert!(!registry.heartbeat(user, "ghost", meta("ios")).unwrap());
    assert_eq!(registry.count(user).unwrap(), 0);

    registry.register(user, "dev-1", meta("ios")).unwrap();
    assert!(registry.heartbeat(user, "dev-1", meta("ios")).unwrap());
}

#[test]
fn revocation_frees_a_slot() {
    let registry = registry(1);
    let user = UserId::new();
    registry.register(user, "dev-1", meta("ios")).unwrap();
    assert!(registry
        .register(user, "dev-2", meta("android"))
        .is_err());

    assert!(registry.revoke(user, "dev-1").unwrap());
    assert!(!registry.revoke(user, "dev-1").unwrap());
    registry.register(user, "dev-2", meta("android")).unwrap();
}

#[test]
fn list_orders_by_most_recently_seen() {
    let registry = registry(3);
    let user = UserId::new();
    registry.register(user, "dev-1", meta("ios")).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    registry.register(user, "dev-2", meta("android")).unwrap();

    let devices = registry.list(user).unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].device_uuid, "dev-2");
}
