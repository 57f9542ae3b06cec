//! In-memory implementation of the repository traits.
//!
//! Zero-dependency stand-in for unit tests; behavior mirrors
//! `SqliteStore` including the fan-out and last-write-wins rules.

use crate::error::{StorageError, StorageResult};
use crate::repo::{
    CatalogRepository, DeviceRepository, DownloadRepository, GrantRepository,
    SubscriptionRepository,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tonegate_types::{
    AccessType, Device, DeviceMetadata, DownloadId, DownloadRecord, DownloadTarget, Grant,
    MediaItem, Plan, ResourceKind, ResourceRef, Subscription, SubscriptionStatus, UserId,
};

#[derive(Default)]
struct Inner {
    grants: Vec<Grant>,
    subscriptions: Vec<Subscription>,
    plans: HashMap<String, Plan>,
    devices: Vec<Device>,
    downloads: HashMap<DownloadId, DownloadRecord>,
    media: HashMap<(ResourceKindTag, String), MediaItem>,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy)]
enum ResourceKindTag {
    Music,
    Tts,
}

fn tag(target: &DownloadTarget) -> (ResourceKindTag, String) {
    match target {
        DownloadTarget::MusicProduct(id) => (ResourceKindTag::Music, id.clone()),
        DownloadTarget::TtsProduct(id) => (ResourceKindTag::Tts, id.clone()),
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl GrantRepository for MemoryStore {
    fn insert_grant(&self, grant: &Grant) -> StorageResult<()> {
        self.lock().grants.push(grant.clone());
        Ok(())
    }

    fn upsert_category_grant(&self, grant: &Grant) -> StorageResult<()> {
        let mut inner = self.lock();
        let existing = inner.grants.iter_mut().find(|g| {
            g.user_id == grant.user_id
                && g.resource.kind == ResourceKind::TtsCategory
                && g.resource.identifier == grant.resource.identifier
        });
        match existing {
            Some(g) => *g = grant.clone(),
            None => inner.grants.push(grant.clone()),
        }
        Ok(())
    }

    fn grants_for_resource(
        &self,
        user_id: UserId,
        resource: &ResourceRef,
    ) -> StorageResult<Vec<Grant>> {
        Ok(self
            .lock()
            .grants
            .iter()
            .filter(|g| g.user_id == user_id && g.resource == *resource)
            .cloned()
            .collect())
    }

    fn active_category_names(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self
            .lock()
            .grants
            .iter()
            .filter(|g| {
                g.user_id == user_id
                    && g.resource.kind == ResourceKind::TtsCategory
                    && g.is_valid_at(now)
            })
            .map(|g| g.resource.identifier.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn grant_subscription_access(
        &self,
        user_id: UserId,
        plan: &Plan,
        categories: &[String],
        ends_at: DateTime<Utc>,
        subscription_ref: &str,
    ) -> StorageResult<Vec<Grant>> {
        let now = Utc::now();
        let mut granted = Vec::new();

        if plan.includes_music_library {
            let grant = Grant {
                user_id,
                resource: ResourceRef::music_library(),
                access_type: AccessType::Subscription,
                granted_at: now,
                expires_at: Some(ends_at),
                purchase_reference: Some(subscription_ref.to_string()),
                is_active: true,
            };
            self.insert_grant(&grant)?;
            granted.push(grant);
        }
        for category in categories {
            let grant = Grant {
                user_id,
                resource: ResourceRef::tts_category(category.clone()),
                access_type: AccessType::Subscription,
                granted_at: now,
                expires_at: Some(ends_at),
                purchase_reference: Some(subscription_ref.to_string()),
                is_active: true,
            };
            self.upsert_category_grant(&grant)?;
            granted.push(grant);
        }
        Ok(granted)
    }

    fn revoke_by_subscription(
        &self,
        user_id: UserId,
        subscription_ref: &str,
    ) -> StorageResult<u64> {
        let mut flipped = 0;
        for g in self.lock().grants.iter_mut() {
            if g.user_id == user_id
                && g.access_type == AccessType::Subscription
                && g.purchase_reference.as_deref() == Some(subscription_ref)
                && g.is_active
            {
                g.is_active = false;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    fn deactivate_expired_grants(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut swept = 0;
        for g in self.lock().grants.iter_mut() {
            if g.is_active && g.is_expired_at(now) {
                g.is_active = false;
                swept += 1;
            }
        }
        Ok(swept)
    }
}

impl SubscriptionRepository for MemoryStore {
    fn upsert_subscription(&self, subscription: &Subscription) -> StorageResult<()> {
        let mut inner = self.lock();
        inner
            .subscriptions
            .retain(|s| s.reference != subscription.reference);
        inner.subscriptions.push(subscription.clone());
        Ok(())
    }

    fn active_subscription(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<Subscription>> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active_at(now))
            .max_by_key(|s| s.ends_at)
            .cloned())
    }

    fn set_subscription_status(
        &self,
        reference: &str,
        status: SubscriptionStatus,
    ) -> StorageResult<()> {
        let mut inner = self.lock();
        let sub = inner
            .subscriptions
            .iter_mut()
            .find(|s| s.reference == reference)
            .ok_or_else(|| StorageError::NotFound(format!("subscription {reference}")))?;
        sub.status = status;
        Ok(())
    }

    fn upsert_plan(&self, plan: &Plan) -> StorageResult<()> {
        self.lock().plans.insert(plan.slug.clone(), plan.clone());
        Ok(())
    }

    fn find_plan(&self, slug: &str) -> StorageResult<Option<Plan>> {
        Ok(self.lock().plans.get(slug).cloned())
    }
}

impl DeviceRepository for MemoryStore {
    fn upsert_device(&self, device: &Device) -> StorageResult<()> {
        let mut inner = self.lock();
        inner
            .devices
            .retain(|d| !(d.user_id == device.user_id && d.device_uuid == device.device_uuid));
        inner.devices.push(device.clone());
        Ok(())
    }

    fn find_device(&self, user_id: UserId, device_uuid: &str) -> StorageResult<Option<Device>> {
        Ok(self
            .lock()
            .devices
            .iter()
            .find(|d| d.user_id == user_id && d.device_uuid == device_uuid)
            .cloned())
    }

    fn device_count(&self, user_id: UserId) -> StorageResult<u32> {
        Ok(self
            .lock()
            .devices
            .iter()
            .filter(|d| d.user_id == user_id)
            .count() as u32)
    }

    fn list_devices(&self, user_id: UserId) -> StorageResult<Vec<Device>> {
        let mut devices: Vec<Device> = self
            .lock()
            .devices
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        devices.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        Ok(devices)
    }

    fn touch_device(
        &self,
        user_id: UserId,
        device_uuid: &str,
        metadata: &DeviceMetadata,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut inner = self.lock();
        let Some(device) = inner
            .devices
            .iter_mut()
            .find(|d| d.user_id == user_id && d.device_uuid == device_uuid)
        else {
            return Ok(false);
        };
        device.last_seen_at = now;
        if metadata.ip.is_some() {
            device.last_ip = metadata.ip.clone();
        }
        if metadata.platform.is_some() {
            device.platform = metadata.platform.clone();
        }
        if metadata.model.is_some() {
            device.model = metadata.model.clone();
        }
        if metadata.app_version.is_some() {
            device.app_version = metadata.app_version.clone();
        }
        Ok(true)
    }

    fn delete_device(&self, user_id: UserId, device_uuid: &str) -> StorageResult<bool> {
        let mut inner = self.lock();
        let before = inner.devices.len();
        inner
            .devices
            .retain(|d| !(d.user_id == user_id && d.device_uuid == device_uuid));
        Ok(inner.devices.len() < before)
    }
}

impl DownloadRepository for MemoryStore {
    fn insert_download(&self, record: &DownloadRecord) -> StorageResult<()> {
        self.lock().downloads.insert(record.id, record.clone());
        Ok(())
    }

    fn find_download(&self, id: DownloadId) -> StorageResult<Option<DownloadRecord>> {
        Ok(self.lock().downloads.get(&id).cloned())
    }

    fn complete_download(
        &self,
        id: DownloadId,
        bytes: Option<u64>,
        sha256: Option<String>,
        device_uuid: Option<String>,
        now: DateTime<Utc>,
    ) -> StorageResult<DownloadRecord> {
        let mut inner = self.lock();
        let record = inner
            .downloads
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("download {id}")))?;
        record.completed = true;
        record.completed_at.get_or_insert(now);
        if bytes.is_some() {
            record.bytes = bytes;
        }
        if sha256.is_some() {
            record.sha256 = sha256;
        }
        if device_uuid.is_some() {
            record.device_uuid = device_uuid;
        }
        Ok(record.clone())
    }
}

impl CatalogRepository for MemoryStore {
    fn upsert_media_item(&self, item: &MediaItem) -> StorageResult<()> {
        self.lock().media.insert(tag(&item.target), item.clone());
        Ok(())
    }

    fn find_media_item(&self, target: &DownloadTarget) -> StorageResult<Option<MediaItem>> {
        Ok(self.lock().media.get(&tag(target)).cloned())
    }

    fn list_tts_categories(&self) -> StorageResult<Vec<String>> {
        let mut categories: Vec<String> = self
            .lock()
            .media
            .values()
            .filter_map(|m| m.tts_category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }
}
