//! SQLite storage layer for Tonegate.
//!
//! Persists grants, subscriptions, plans, devices, download records and the
//! read-only media catalog. Repositories are traits so the entitlement
//! resolver and device registry stay free of storage concerns; `SqliteStore`
//! is the production implementation and `MemoryStore` backs unit tests.
//!
//! # Invariants
//!
//! - Grants are never hard-deleted. Revocation and the expiry sweep flip
//!   `is_active`; resolution compares `expires_at` to now regardless.
//! - Subscription fan-out (one library grant plus N category grants) is a
//!   single transaction. Partial fan-out is a correctness bug.

mod error;
mod memory;
mod repo;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use repo::{
    CatalogRepository, DeviceRepository, DownloadRepository, GrantRepository,
    SubscriptionRepository,
};
pub use sqlite::SqliteStore;
