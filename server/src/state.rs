//! Shared application state.

use chrono::Duration;
use std::sync::Arc;
use tonegate_delivery::{DeliveryConfig, LoadCounter, MediaVault};
use tonegate_devices::DeviceRegistry;
use tonegate_entitlements::EntitlementResolver;
use tonegate_store::{
    CatalogRepository, DeviceRepository, DownloadRepository, GrantRepository,
    SubscriptionRepository,
};
use tonegate_tickets::TicketIssuer;
use tonegate_types::DEFAULT_DEVICE_LIMIT;

/// Server-level knobs, filled from CLI args in the binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Per-user registered device limit.
    pub device_limit: u32,
    /// How long an issued download ticket stays redeemable.
    pub ticket_ttl: Duration,
    /// Chunking and pacing parameters.
    pub delivery: DeliveryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            device_limit: DEFAULT_DEVICE_LIMIT,
            ticket_ttl: Duration::minutes(30),
            delivery: DeliveryConfig::default(),
        }
    }
}

/// Everything the handlers need, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub grants: Arc<dyn GrantRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub downloads: Arc<dyn DownloadRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub resolver: Arc<EntitlementResolver>,
    pub registry: Arc<DeviceRegistry>,
    pub vault: Arc<MediaVault>,
    pub tickets: Arc<TicketIssuer>,
    pub load: Arc<LoadCounter>,
    pub delivery: DeliveryConfig,
    pub ticket_ttl: Duration,
}

impl AppState {
    /// Wires the state from one store implementing every repository,
    /// the media vault, and the ticket secret.
    pub fn new<S>(
        store: Arc<S>,
        vault: MediaVault,
        ticket_secret: impl Into<Vec<u8>>,
        config: ServerConfig,
    ) -> Self
    where
        S: GrantRepository
            + SubscriptionRepository
            + DeviceRepository
            + DownloadRepository
            + CatalogRepository
            + 'static,
    {
        let grants: Arc<dyn GrantRepository> = store.clone();
        let subscriptions: Arc<dyn SubscriptionRepository> = store.clone();
        let downloads: Arc<dyn DownloadRepository> = store.clone();
        let catalog: Arc<dyn CatalogRepository> = store.clone();
        let devices: Arc<dyn DeviceRepository> = store;

        let resolver = Arc::new(EntitlementResolver::new(
            grants.clone(),
            subscriptions.clone(),
        ));
        let registry = Arc::new(DeviceRegistry::new(devices, config.device_limit));

        Self {
            grants,
            subscriptions,
            downloads,
            catalog,
            resolver,
            registry,
            vault: Arc::new(vault),
            tickets: Arc::new(TicketIssuer::new(ticket_secret)),
            load: Arc::new(LoadCounter::default()),
            delivery: config.delivery,
            ticket_ttl: config.ticket_ttl,
        }
    }
}
