//! Repository traits over the persisted state.
//!
//! Consumers depend on `Arc<dyn …>` and never see SQL. All methods are
//! synchronous; queries are short and the HTTP layer calls them directly.

use crate::StorageResult;
use chrono::{DateTime, Utc};
use tonegate_types::{
    Device, DeviceMetadata, DownloadId, DownloadRecord, DownloadTarget, Grant, MediaItem, Plan,
    ResourceRef, Subscription, SubscriptionStatus, UserId,
};

/// Access-right records: creation, fan-out, revocation, queries.
pub trait GrantRepository: Send + Sync {
    /// Appends a grant row. Library and single-product purchases always
    /// add a new row; the resolver's tie-break picks the most permissive.
    fn insert_grant(&self, grant: &Grant) -> StorageResult<()>;

    /// Upserts a category grant keyed on (user, category). Re-granting a
    /// category updates the existing row instead of duplicating it.
    fn upsert_category_grant(&self, grant: &Grant) -> StorageResult<()>;

    /// Every grant row for the given (user, resource) pair, active or not.
    fn grants_for_resource(
        &self,
        user_id: UserId,
        resource: &ResourceRef,
    ) -> StorageResult<Vec<Grant>>;

    /// Category names with an active, unexpired grant for the user.
    fn active_category_names(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<String>>;

    /// Fans a subscription out into grants, transactionally: one library
    /// grant when the plan includes the library, plus one category grant
    /// per entry in `categories` (the caller expands "all categories"
    /// against the catalog). Returns the grants written.
    fn grant_subscription_access(
        &self,
        user_id: UserId,
        plan: &Plan,
        categories: &[String],
        ends_at: DateTime<Utc>,
        subscription_ref: &str,
    ) -> StorageResult<Vec<Grant>>;

    /// Flips `is_active` off on every grant whose purchase reference
    /// matches and whose access type is `subscription`. Purchase-derived
    /// grants are untouched. Returns the number of rows flipped.
    fn revoke_by_subscription(&self, user_id: UserId, subscription_ref: &str)
        -> StorageResult<u64>;

    /// Background sweep: deactivates rows whose expiry has passed.
    /// Resolution never depends on this having run.
    fn deactivate_expired_grants(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// Subscription periods and the plans they reference.
pub trait SubscriptionRepository: Send + Sync {
    /// Inserts or replaces a subscription period, keyed on its reference.
    fn upsert_subscription(&self, subscription: &Subscription) -> StorageResult<()>;

    /// The user's active subscription whose period covers `now`, if any.
    fn active_subscription(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<Subscription>>;

    /// Updates the status of the subscription with the given reference.
    fn set_subscription_status(
        &self,
        reference: &str,
        status: SubscriptionStatus,
    ) -> StorageResult<()>;

    /// Inserts or replaces a plan definition.
    fn upsert_plan(&self, plan: &Plan) -> StorageResult<()>;

    /// Looks up a plan by slug.
    fn find_plan(&self, slug: &str) -> StorageResult<Option<Plan>>;
}

/// Registered devices per user.
pub trait DeviceRepository: Send + Sync {
    /// Inserts or replaces a device row keyed on (user, device_uuid).
    fn upsert_device(&self, device: &Device) -> StorageResult<()>;

    /// Looks up one device.
    fn find_device(&self, user_id: UserId, device_uuid: &str) -> StorageResult<Option<Device>>;

    /// Number of devices currently registered for the user.
    fn device_count(&self, user_id: UserId) -> StorageResult<u32>;

    /// All devices for the user, most recently seen first.
    fn list_devices(&self, user_id: UserId) -> StorageResult<Vec<Device>>;

    /// Stamps `last_seen_at` (and any provided metadata) on an existing
    /// device. Returns false when the device is not registered.
    fn touch_device(
        &self,
        user_id: UserId,
        device_uuid: &str,
        metadata: &DeviceMetadata,
        now: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Removes a device. Returns false when it was not registered.
    fn delete_device(&self, user_id: UserId, device_uuid: &str) -> StorageResult<bool>;
}

/// Download audit records.
pub trait DownloadRepository: Send + Sync {
    /// Inserts a pending download record.
    fn insert_download(&self, record: &DownloadRecord) -> StorageResult<()>;

    /// Looks up a download record by id.
    fn find_download(&self, id: DownloadId) -> StorageResult<Option<DownloadRecord>>;

    /// Marks a download completed. Idempotent: later calls overwrite the
    /// reported fields (last write wins) but `completed_at` keeps its
    /// first value. Returns the updated record.
    fn complete_download(
        &self,
        id: DownloadId,
        bytes: Option<u64>,
        sha256: Option<String>,
        device_uuid: Option<String>,
        now: DateTime<Utc>,
    ) -> StorageResult<DownloadRecord>;
}

/// Read-only view of the media catalog (administered elsewhere).
pub trait CatalogRepository: Send + Sync {
    /// Inserts or replaces a catalog entry (used by seeding and tests).
    fn upsert_media_item(&self, item: &MediaItem) -> StorageResult<()>;

    /// Looks up the catalog entry for a product.
    fn find_media_item(&self, target: &DownloadTarget) -> StorageResult<Option<MediaItem>>;

    /// Every TTS category named in the catalog, used to expand
    /// "all categories included" plans at fan-out time.
    fn list_tts_categories(&self) -> StorageResult<Vec<String>>;
}
