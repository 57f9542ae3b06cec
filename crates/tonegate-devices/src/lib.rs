//! Device registration and limit enforcement.
//!
//! Each user may register at most `limit` devices. Re-registering an
//! existing device is idempotent and never counts against the limit.
//! The count-then-insert sequence is serialized per user so two
//! concurrent first-time registrations cannot both take the last slot.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tonegate_store::DeviceRepository;
use tonegate_types::{Device, DeviceMetadata, UserId, DEFAULT_DEVICE_LIMIT};

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors from the device registry.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The user is at their device limit.
    #[error("device limit reached ({current}/{limit})")]
    LimitReached { current: u32, limit: u32 },

    /// The underlying store failed.
    #[error("storage error: {0}")]
    Storage(#[from] tonegate_store::StorageError),
}

/// The per-user device registry.
pub struct DeviceRegistry {
    devices: Arc<dyn DeviceRepository>,
    limit: u32,
    // One lock per user; only registration takes it. Heartbeats and
    // revocations are single upserts/deletes and stay lock-free.
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl DeviceRegistry {
    /// Creates a registry with the given per-user device limit.
    pub fn new(devices: Arc<dyn DeviceRepository>, limit: u32) -> Self {
        Self {
            devices,
            limit,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a registry with the default limit.
    pub fn with_default_limit(devices: Arc<dyn DeviceRepository>) -> Self {
        Self::new(devices, DEFAULT_DEVICE_LIMIT)
    }

    /// The configured per-user limit.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn user_lock(&self, user_id: UserId) -> Arc<Mutex<()>> {
        let mut locks = self
            .user_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        locks.entry(user_id).or_default().clone()
    }

    /// Returns true if `register` would succeed: the device is already
    /// registered (idempotent re-registration) or a slot is free.
    pub fn can_register(&self, user_id: UserId, device_uuid: &str) -> DeviceResult<bool> {
        if self.devices.find_device(user_id, device_uuid)?.is_some() {
            return Ok(true);
        }
        Ok(self.devices.device_count(user_id)? < self.limit)
    }

    /// Registers or refreshes a device, enforcing the limit.
    ///
    /// Serialized per user: when exactly one slot remains, only one of
    /// two racing first-time registrations wins; the other gets
    /// `LimitReached`.
    pub fn register(
        &self,
        user_id: UserId,
        device_uuid: &str,
        metadata: DeviceMetadata,
    ) -> DeviceResult<Device> {
        let lock = self.user_lock(user_id);
        let _guard: MutexGuard<'_, ()> = lock.lock().unwrap_or_else(|e| e.into_inner());

        let existing = self.devices.find_device(user_id, device_uuid)?;
        if existing.is_none() {
            let current = self.devices.device_count(user_id)?;
            if current >= self.limit {
                return Err(DeviceError::LimitReached {
                    current,
                    limit: self.limit,
                });
            }
        }

        let device = Device {
            user_id,
            device_uuid: device_uuid.to_string(),
            platform: metadata.platform.or(existing.as_ref().and_then(|d| d.platform.clone())),
            model: metadata.model.or(existing.as_ref().and_then(|d| d.model.clone())),
            app_version: metadata
                .app_version
                .or(existing.as_ref().and_then(|d| d.app_version.clone())),
            last_ip: metadata.ip.or(existing.as_ref().and_then(|d| d.last_ip.clone())),
            last_seen_at: Utc::now(),
        };
        self.devices.upsert_device(&device)?;
        tracing::debug!(user = %user_id, device = device_uuid, "device registered");
        Ok(device)
    }

    /// Stamps `last_seen_at` on a registered device. Returns false when
    /// the device is unknown; a heartbeat never registers.
    pub fn heartbeat(
        &self,
        user_id: UserId,
        device_uuid: &str,
        metadata: DeviceMetadata,
    ) -> DeviceResult<bool> {
        Ok(self
            .devices
            .touch_device(user_id, device_uuid, &metadata, Utc::now())?)
    }

    /// Removes a device, freeing its slot. Returns false when it was
    /// not registered.
    pub fn revoke(&self, user_id: UserId, device_uuid: &str) -> DeviceResult<bool> {
        let removed = self.devices.delete_device(user_id, device_uuid)?;
        if removed {
            tracing::debug!(user = %user_id, device = device_uuid, "device revoked");
        }
        Ok(removed)
    }

    /// All devices for the user, most recently seen first.
    pub fn list(&self, user_id: UserId) -> DeviceResult<Vec<Device>> {
        Ok(self.devices.list_devices(user_id)?)
    }

    /// Number of registered devices for the user.
    pub fn count(&self, user_id: UserId) -> DeviceResult<u32> {
        Ok(self.devices.device_count(user_id)?)
    }
}
