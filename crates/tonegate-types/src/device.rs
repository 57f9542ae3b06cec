//! Registered devices.

use crate::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of devices a user may register.
pub const DEFAULT_DEVICE_LIMIT: u32 = 2;

/// One registered device for a user.
///
/// Created on first registration, updated on heartbeat, deleted on
/// explicit revocation. The `device_uuid` is client-supplied and unique
/// per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Owning user.
    pub user_id: UserId,
    /// Client-supplied device identifier, unique per user.
    pub device_uuid: String,
    /// Platform name, e.g. "ios" or "android".
    pub platform: Option<String>,
    /// Hardware model string.
    pub model: Option<String>,
    /// App version last seen on this device.
    pub app_version: Option<String>,
    /// IP address of the last request.
    pub last_ip: Option<String>,
    /// Last registration or heartbeat time.
    pub last_seen_at: DateTime<Utc>,
}

/// Metadata supplied when registering or heartbeating a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub platform: Option<String>,
    pub model: Option<String>,
    pub app_version: Option<String>,
    pub ip: Option<String>,
}
