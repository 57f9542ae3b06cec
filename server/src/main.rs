//! Tonegate server binary.
//!
//! Serves the entitlement and secure-delivery API over HTTP. Media is
//! stored encrypted under the media directory; grants, subscriptions,
//! devices and download records live in a SQLite database under the
//! data directory.
//!
//! Usage:
//!   tonegate-server --port 8080 --data-dir ./data --media-dir ./media

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tonegate_crypto::{derive_vault_key, KdfParams, Salt, SALT_SIZE};
use tonegate_delivery::{DeliveryConfig, MediaVault};
use tonegate_server::{build_router, AppState, ServerConfig};
use tonegate_store::{GrantRepository, SqliteStore};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tonegate-server")]
#[command(about = "Tonegate entitlement and secure delivery server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Directory for the database and key salt
    #[arg(long, default_value = "tonegate-data")]
    data_dir: PathBuf,

    /// Directory for encrypted media files
    #[arg(long, default_value = "tonegate-media")]
    media_dir: PathBuf,

    /// Server secret for ticket signing and vault key derivation
    /// (falls back to the TONEGATE_SECRET environment variable)
    #[arg(long)]
    secret: Option<String>,

    /// Registered devices allowed per user
    #[arg(long, default_value = "2")]
    device_limit: u32,

    /// Download ticket lifetime in seconds
    #[arg(long, default_value = "1800")]
    ticket_ttl_secs: i64,

    /// Streaming chunk size in bytes
    #[arg(long, default_value = "16384")]
    chunk_size: usize,

    /// Inter-chunk delay in milliseconds under normal load
    #[arg(long, default_value = "0")]
    normal_delay_ms: u64,

    /// Inter-chunk delay in milliseconds when throttled
    #[arg(long, default_value = "35")]
    throttled_delay_ms: u64,

    /// Per-stream bandwidth cap in KiB/s (0 disables)
    #[arg(long, default_value = "0")]
    hard_cap_kbps: u32,

    /// Stream starts per minute above which delivery throttles
    #[arg(long, default_value = "10")]
    global_threshold: usize,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Tonegate server starting...");

    let secret = args
        .secret
        .or_else(|| std::env::var("TONEGATE_SECRET").ok())
        .context("no server secret: pass --secret or set TONEGATE_SECRET")?;

    std::fs::create_dir_all(&args.data_dir).context("Failed to create data directory")?;
    let salt = load_or_generate_salt(&args.data_dir.join("vault.salt"))?;
    let key = derive_vault_key(&secret, &salt, &KdfParams::default())
        .context("Failed to derive vault key")?;

    let store = Arc::new(
        SqliteStore::open(&args.data_dir.join("tonegate.db"))
            .context("Failed to open database")?,
    );
    let vault = MediaVault::open(&args.media_dir, key)
        .await
        .context("Failed to open media vault")?;

    // Hourly expiry sweep. Resolution checks expiry itself; this only
    // keeps the is_active flags tidy for reporting.
    let sweep_store = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match sweep_store.deactivate_expired_grants(chrono::Utc::now()) {
                Ok(0) => {}
                Ok(swept) => info!("expiry sweep deactivated {} grants", swept),
                Err(e) => tracing::warn!("expiry sweep failed: {}", e),
            }
        }
    });

    let config = ServerConfig {
        device_limit: args.device_limit,
        ticket_ttl: chrono::Duration::seconds(args.ticket_ttl_secs),
        delivery: DeliveryConfig {
            chunk_size: args.chunk_size,
            normal_delay: Duration::from_millis(args.normal_delay_ms),
            throttled_delay: Duration::from_millis(args.throttled_delay_ms),
            hard_cap_kbps: args.hard_cap_kbps,
            global_threshold: args.global_threshold,
        },
    };
    let state = AppState::new(store, vault, secret.into_bytes(), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .context("Failed to bind listen port")?;
    info!("Listening on port {}", args.port);
    info!("Data dir:  {:?}", args.data_dir);
    info!("Media dir: {:?}", args.media_dir);

    axum::serve(listener, app).await.context("HTTP server failed")
}

fn load_or_generate_salt(path: &PathBuf) -> Result<Salt> {
    if path.exists() {
        info!("Loading vault salt from {:?}", path);
        let bytes = std::fs::read(path).context("Failed to read salt file")?;
        let bytes: [u8; SALT_SIZE] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("salt file has wrong length"))?;
        Ok(Salt::from_bytes(bytes))
    } else {
        info!("Generating new vault salt at {:?}", path);
        let salt = Salt::random();
        std::fs::write(path, salt.as_bytes()).context("Failed to write salt file")?;
        Ok(salt)
    }
}
