//! SQLite-backed implementation of the repository traits.
//!
//! One connection behind a mutex; every query is short-lived. The schema
//! is created on open.

use crate::error::{StorageError, StorageResult};
use crate::repo::{
    CatalogRepository, DeviceRepository, DownloadRepository, GrantRepository,
    SubscriptionRepository,
};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tonegate_types::{
    AccessType, Device, DeviceMetadata, DownloadId, DownloadRecord, DownloadTarget, Grant,
    MediaItem, Plan, ResourceKind, ResourceRef, Subscription, SubscriptionStatus, UserId,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS grants (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id             TEXT NOT NULL,
    content_type        TEXT NOT NULL,
    content_identifier  TEXT NOT NULL,
    access_type         TEXT NOT NULL,
    granted_at          INTEGER NOT NULL,
    expires_at          INTEGER,
    purchase_reference  TEXT,
    is_active           INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_grants_lookup
    ON grants(user_id, content_type, content_identifier);

CREATE TABLE IF NOT EXISTS subscriptions (
    reference   TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    plan_slug   TEXT NOT NULL,
    status      TEXT NOT NULL,
    starts_at   INTEGER NOT NULL,
    ends_at     INTEGER NOT NULL,
    auto_renew  INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);

CREATE TABLE IF NOT EXISTS plans (
    slug                        TEXT PRIMARY KEY,
    name                        TEXT NOT NULL,
    includes_music_library      INTEGER NOT NULL,
    includes_all_tts_categories INTEGER NOT NULL,
    included_tts_categories     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS devices (
    user_id      TEXT NOT NULL,
    device_uuid  TEXT NOT NULL,
    platform     TEXT,
    model        TEXT,
    app_version  TEXT,
    last_ip      TEXT,
    last_seen_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, device_uuid)
);

CREATE TABLE IF NOT EXISTS downloads (
    id           TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    target_kind  TEXT NOT NULL,
    product_id   TEXT NOT NULL,
    device_uuid  TEXT,
    bytes        INTEGER,
    sha256       TEXT,
    completed    INTEGER NOT NULL DEFAULT 0,
    completed_at INTEGER,
    requested_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS media_items (
    target_kind    TEXT NOT NULL,
    product_id     TEXT NOT NULL,
    slug           TEXT NOT NULL,
    encrypted_path TEXT NOT NULL,
    tts_category   TEXT,
    PRIMARY KEY (target_kind, product_id)
);
";

/// Production store backed by a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory database, mainly for tests.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-query;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(secs: i64) -> StorageResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| StorageError::InvalidData(format!("bad timestamp: {secs}")))
}

fn target_columns(target: &DownloadTarget) -> (&'static str, &str) {
    match target {
        DownloadTarget::MusicProduct(id) => ("music", id.as_str()),
        DownloadTarget::TtsProduct(id) => ("tts", id.as_str()),
    }
}

fn target_from_columns(kind: &str, product_id: String) -> StorageResult<DownloadTarget> {
    match kind {
        "music" => Ok(DownloadTarget::MusicProduct(product_id)),
        "tts" => Ok(DownloadTarget::TtsProduct(product_id)),
        other => Err(StorageError::InvalidData(format!(
            "bad download target kind: {other}"
        ))),
    }
}

type GrantParts = (
    String,
    String,
    String,
    String,
    i64,
    Option<i64>,
    Option<String>,
    bool,
);

fn grant_row(row: &Row<'_>) -> rusqlite::Result<GrantParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn finish_grant(parts: GrantParts) -> StorageResult<Grant> {
    let (user, kind, identifier, access, granted_at, expires_at, purchase_reference, is_active) =
        parts;
    Ok(Grant {
        user_id: UserId::parse(&user).map_err(|e| StorageError::InvalidData(e.to_string()))?,
        resource: ResourceRef {
            kind: ResourceKind::parse(&kind)?,
            identifier,
        },
        access_type: AccessType::parse(&access)?,
        granted_at: from_ts(granted_at)?,
        expires_at: expires_at.map(from_ts).transpose()?,
        purchase_reference,
        is_active,
    })
}

fn insert_grant_row(conn: &Connection, grant: &Grant) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO grants (user_id, content_type, content_identifier, access_type,
                             granted_at, expires_at, purchase_reference, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            grant.user_id.to_string(),
            grant.resource.kind.as_str(),
            grant.resource.identifier,
            grant.access_type.as_str(),
            ts(grant.granted_at),
            grant.expires_at.map(ts),
            grant.purchase_reference,
            grant.is_active,
        ],
    )?;
    Ok(())
}

fn upsert_category_grant_row(conn: &Connection, grant: &Grant) -> StorageResult<()> {
    let updated = conn.execute(
        "UPDATE grants
         SET access_type = ?1, granted_at = ?2, expires_at = ?3,
             purchase_reference = ?4, is_active = ?5
         WHERE user_id = ?6 AND content_type = 'tts_category'
           AND content_identifier = ?7",
        params![
            grant.access_type.as_str(),
            ts(grant.granted_at),
            grant.expires_at.map(ts),
            grant.purchase_reference,
            grant.is_active,
            grant.user_id.to_string(),
            grant.resource.identifier,
        ],
    )?;
    if updated == 0 {
        insert_grant_row(conn, grant)?;
    }
    Ok(())
}

impl GrantRepository for SqliteStore {
    fn insert_grant(&self, grant: &Grant) -> StorageResult<()> {
        insert_grant_row(&self.lock(), grant)
    }

    fn upsert_category_grant(&self, grant: &Grant) -> StorageResult<()> {
        upsert_category_grant_row(&self.lock(), grant)
    }

    fn grants_for_resource(
        &self,
        user_id: UserId,
        resource: &ResourceRef,
    ) -> StorageResult<Vec<Grant>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, content_type, content_identifier, access_type,
                    granted_at, expires_at, purchase_reference, is_active
             FROM grants
             WHERE user_id = ?1 AND content_type = ?2 AND content_identifier = ?3",
        )?;
        let rows = stmt.query_map(
            params![
                user_id.to_string(),
                resource.kind.as_str(),
                resource.identifier
            ],
            grant_row,
        )?;
        rows.map(|r| finish_grant(r?)).collect()
    }

    fn active_category_names(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT content_identifier FROM grants
             WHERE user_id = ?1 AND content_type = 'tts_category'
               AND is_active = 1
               AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY content_identifier",
        )?;
        let rows = stmt.query_map(params![user_id.to_string(), ts(now)], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .map_err(Into::into)
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

        let mut conn = self.lock();
        let tx = conn.transaction()?;

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
            insert_grant_row(&tx, &grant)?;
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
            upsert_category_grant_row(&tx, &grant)?;
            granted.push(grant);
        }

        tx.commit()?;
        tracing::info!(
            user = %user_id,
            subscription = subscription_ref,
            grants = granted.len(),
            "subscription access fanned out"
        );
        Ok(granted)
    }

    fn revoke_by_subscription(
        &self,
        user_id: UserId,
        subscription_ref: &str,
    ) -> StorageResult<u64> {
        let flipped = self.lock().execute(
            "UPDATE grants SET is_active = 0
             WHERE user_id = ?1 AND purchase_reference = ?2
               AND access_type = 'subscription' AND is_active = 1",
            params![user_id.to_string(), subscription_ref],
        )?;
        Ok(flipped as u64)
    }

    fn deactivate_expired_grants(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let swept = self.lock().execute(
            "UPDATE grants SET is_active = 0
             WHERE is_active = 1 AND expires_at IS NOT NULL AND expires_at <= ?1",
            params![ts(now)],
        )?;
        if swept > 0 {
            tracing::info!(swept, "expiry sweep deactivated grants");
        }
        Ok(swept as u64)
    }
}

impl SubscriptionRepository for SqliteStore {
    fn upsert_subscription(&self, subscription: &Subscription) -> StorageResult<()> {
        self.lock().execute(
            "INSERT OR REPLACE INTO subscriptions
                 (reference, user_id, plan_slug, status, starts_at, ends_at, auto_renew)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                subscription.reference,
                subscription.user_id.to_string(),
                subscription.plan_slug,
                subscription.status.as_str(),
                ts(subscription.starts_at),
                ts(subscription.ends_at),
                subscription.auto_renew,
            ],
        )?;
        Ok(())
    }

    fn active_subscription(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<Subscription>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT reference, user_id, plan_slug, status, starts_at, ends_at, auto_renew
             FROM subscriptions
             WHERE user_id = ?1 AND status = 'active' AND ends_at > ?2
             ORDER BY ends_at DESC LIMIT 1",
        )?;
        let row = stmt
            .query_row(params![user_id.to_string(), ts(now)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, bool>(6)?,
                ))
            })
            .optional()?;

        let Some((reference, user, plan_slug, status, starts, ends, auto_renew)) = row else {
            return Ok(None);
        };
        Ok(Some(Subscription {
            reference,
            user_id: UserId::parse(&user)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?,
            plan_slug,
            status: SubscriptionStatus::parse(&status)?,
            starts_at: from_ts(starts)?,
            ends_at: from_ts(ends)?,
            auto_renew,
        }))
    }

    fn set_subscription_status(
        &self,
        reference: &str,
        status: SubscriptionStatus,
    ) -> StorageResult<()> {
        let changed = self.lock().execute(
            "UPDATE subscriptions SET status = ?1 WHERE reference = ?2",
            params![status.as_str(), reference],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!(
                "subscription {reference}"
            )));
        }
        Ok(())
    }

    fn upsert_plan(&self, plan: &Plan) -> StorageResult<()> {
        self.lock().execute(
            "INSERT OR REPLACE INTO plans
                 (slug, name, includes_music_library, includes_all_tts_categories,
                  included_tts_categories)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                plan.slug,
                plan.name,
                plan.includes_music_library,
                plan.includes_all_tts_categories,
                serde_json::to_string(&plan.included_tts_categories)?,
            ],
        )?;
        Ok(())
    }

    fn find_plan(&self, slug: &str) -> StorageResult<Option<Plan>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT slug, name, includes_music_library, includes_all_tts_categories,
                    included_tts_categories
             FROM plans WHERE slug = ?1",
        )?;
        let row = stmt
            .query_row(params![slug], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()?;

        let Some((slug, name, music, all_tts, categories_json)) = row else {
            return Ok(None);
        };
        Ok(Some(Plan {
            slug,
            name,
            includes_music_library: music,
            includes_all_tts_categories: all_tts,
            included_tts_categories: serde_json::from_str(&categories_json)?,
        }))
    }
}

impl DeviceRepository for SqliteStore {
    fn upsert_device(&self, device: &Device) -> StorageResult<()> {
        self.lock().execute(
            "INSERT INTO devices
                 (user_id, device_uuid, platform, model, app_version, last_ip, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id, device_uuid) DO UPDATE SET
                 platform = excluded.platform,
                 model = excluded.model,
                 app_version = excluded.app_version,
                 last_ip = excluded.last_ip,
                 last_seen_at = excluded.last_seen_at",
            params![
                device.user_id.to_string(),
                device.device_uuid,
                device.platform,
                device.model,
                device.app_version,
                device.last_ip,
                ts(device.last_seen_at),
            ],
        )?;
        Ok(())
    }

    fn find_device(&self, user_id: UserId, device_uuid: &str) -> StorageResult<Option<Device>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, device_uuid, platform, model, app_version, last_ip, last_seen_at
             FROM devices WHERE user_id = ?1 AND device_uuid = ?2",
        )?;
        let row = stmt
            .query_row(params![user_id.to_string(), device_uuid], device_row)
            .optional()?;
        row.map(finish_device).transpose()
    }

    fn device_count(&self, user_id: UserId) -> StorageResult<u32> {
        let count: u32 = self.lock().query_row(
            "SELECT COUNT(*) FROM devices WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_devices(&self, user_id: UserId) -> StorageResult<Vec<Device>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, device_uuid, platform, model, app_version, last_ip, last_seen_at
             FROM devices WHERE user_id = ?1 ORDER BY last_seen_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], device_row)?;
        rows.map(|r| finish_device(r?)).collect()
    }

    fn touch_device(
        &self,
        user_id: UserId,
        device_uuid: &str,
        metadata: &DeviceMetadata,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let changed = self.lock().execute(
            "UPDATE devices SET
                 last_seen_at = ?1,
                 last_ip = COALESCE(?2, last_ip),
                 platform = COALESCE(?3, platform),
                 model = COALESCE(?4, model),
                 app_version = COALESCE(?5, app_version)
             WHERE user_id = ?6 AND device_uuid = ?7",
            params![
                ts(now),
                metadata.ip,
                metadata.platform,
                metadata.model,
                metadata.app_version,
                user_id.to_string(),
                device_uuid,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_device(&self, user_id: UserId, device_uuid: &str) -> StorageResult<bool> {
        let deleted = self.lock().execute(
            "DELETE FROM devices WHERE user_id = ?1 AND device_uuid = ?2",
            params![user_id.to_string(), device_uuid],
        )?;
        Ok(deleted > 0)
    }
}

type DeviceParts = (String, String, Option<String>, Option<String>, Option<String>, Option<String>, i64);

fn device_row(row: &Row<'_>) -> rusqlite::Result<DeviceParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn finish_device(parts: DeviceParts) -> StorageResult<Device> {
    let (user, device_uuid, platform, model, app_version, last_ip, last_seen) = parts;
    Ok(Device {
        user_id: UserId::parse(&user).map_err(|e| StorageError::InvalidData(e.to_string()))?,
        device_uuid,
        platform,
        model,
        app_version,
        last_ip,
        last_seen_at: from_ts(last_seen)?,
    })
}

impl DownloadRepository for SqliteStore {
    fn insert_download(&self, record: &DownloadRecord) -> StorageResult<()> {
        let (kind, product_id) = target_columns(&record.target);
        self.lock().execute(
            "INSERT INTO downloads
                 (id, user_id, target_kind, product_id, device_uuid, bytes, sha256,
                  completed, completed_at, requested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id.to_string(),
                record.user_id.to_string(),
                kind,
                product_id,
                record.device_uuid,
                record.bytes.map(|b| b as i64),
                record.sha256,
                record.completed,
                record.completed_at.map(ts),
                ts(record.requested_at),
            ],
        )?;
        Ok(())
    }

    fn find_download(&self, id: DownloadId) -> StorageResult<Option<DownloadRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, target_kind, product_id, device_uuid, bytes, sha256,
                    completed, completed_at, requested_at
             FROM downloads WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id.to_string()], download_row)
            .optional()?;
        row.map(finish_download).transpose()
    }

    fn complete_download(
        &self,
        id: DownloadId,
        bytes: Option<u64>,
        sha256: Option<String>,
        device_uuid: Option<String>,
        now: DateTime<Utc>,
    ) -> StorageResult<DownloadRecord> {
        let changed = self.lock().execute(
            "UPDATE downloads SET
                 completed = 1,
                 completed_at = COALESCE(completed_at, ?1),
                 bytes = COALESCE(?2, bytes),
                 sha256 = COALESCE(?3, sha256),
                 device_uuid = COALESCE(?4, device_uuid)
             WHERE id = ?5",
            params![
                ts(now),
                bytes.map(|b| b as i64),
                sha256,
                device_uuid,
                id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("download {id}")));
        }
        self.find_download(id)?
            .ok_or_else(|| StorageError::NotFound(format!("download {id}")))
    }
}

type DownloadParts = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<String>,
    bool,
    Option<i64>,
    i64,
);

fn download_row(row: &Row<'_>) -> rusqlite::Result<DownloadParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn finish_download(parts: DownloadParts) -> StorageResult<DownloadRecord> {
    let (id, user, kind, product_id, device_uuid, bytes, sha256, completed, completed_at, requested) =
        parts;
    Ok(DownloadRecord {
        id: DownloadId::parse(&id).map_err(|e| StorageError::InvalidData(e.to_string()))?,
        user_id: UserId::parse(&user).map_err(|e| StorageError::InvalidData(e.to_string()))?,
        target: target_from_columns(&kind, product_id)?,
        device_uuid,
        bytes: bytes.map(|b| b as u64),
        sha256,
        completed,
        completed_at: completed_at.map(from_ts).transpose()?,
        requested_at: from_ts(requested)?,
    })
}

impl CatalogRepository for SqliteStore {
    fn upsert_media_item(&self, item: &MediaItem) -> StorageResult<()> {
        let (kind, product_id) = target_columns(&item.target);
        self.lock().execute(
            "INSERT OR REPLACE INTO media_items
                 (target_kind, product_id, slug, encrypted_path, tts_category)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![kind, product_id, item.slug, item.encrypted_path, item.tts_category],
        )?;
        Ok(())
    }

    fn find_media_item(&self, target: &DownloadTarget) -> StorageResult<Option<MediaItem>> {
        let (kind, product_id) = target_columns(target);
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT target_kind, product_id, slug, encrypted_path, tts_category
             FROM media_items WHERE target_kind = ?1 AND product_id = ?2",
        )?;
        let row = stmt
            .query_row(params![kind, product_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })
            .optional()?;

        let Some((kind, product_id, slug, encrypted_path, tts_category)) = row else {
            return Ok(None);
        };
        Ok(Some(MediaItem {
            target: target_from_columns(&kind, product_id)?,
            slug,
            encrypted_path,
            tts_category,
        }))
    }

    fn list_tts_categories(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT tts_category FROM media_items
             WHERE tts_category IS NOT NULL ORDER BY tts_category",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .map_err(Into::into)
    }
}
