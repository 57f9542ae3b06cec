//! Vault, load counter, and streaming tests.

use futures::StreamExt;
use std::time::{Duration, Instant};
use tonegate_delivery::{
    preview_slice, stream_chunks, DeliveryConfig, DeliveryMode, LoadCounter, MediaVault, Pacer,
    PREVIEW_BYTES_PER_SECOND,
};

fn test_key() -> tonegate_crypto::VaultKey {
    tonegate_crypto::generate_random_key()
}

// ── Vault ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn vault_round_trips_media() {
    let dir = tempfile::tempdir().unwrap();
    let vault = MediaVault::open(dir.path(), test_key()).await.unwrap();

    let audio = vec![0xA5u8; 48_000];
    let stored = vault.store(&audio).await.unwrap();
    assert!(stored.path.ends_with(".enc"));
    assert_eq!(stored.bytes, 48_000);
    assert_eq!(stored.sha256.len(), 64);

    assert!(vault.exists(&stored.path).await);
    let loaded = vault.load(&stored.path).await.unwrap();
    assert_eq!(loaded, audio);
}

#[tokio::test]
async fn vault_stores_ciphertext_not_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let vault = MediaVault::open(dir.path(), test_key()).await.unwrap();

    let audio = b"clearly recognizable plaintext audio bytes".to_vec();
    let stored = vault.store(&audio).await.unwrap();
    let on_disk = std::fs::read(dir.path().join(&stored.path)).unwrap();
    assert_ne!(on_disk, audio);
    assert!(on_disk.len() > audio.len());
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let vault = MediaVault::open(dir.path(), test_key()).await.unwrap();
    let err = vault.load("ab/0000.enc").await.unwrap_err();
    assert!(matches!(err, tonegate_delivery::DeliveryError::NotFound(_)));
}

#[tokio::test]
async fn traversal_paths_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let vault = MediaVault::open(dir.path(), test_key()).await.unwrap();
    let err = vault.load("../outside.enc").await.unwrap_err();
    assert!(matches!(
        err,
        tonegate_delivery::DeliveryError::InvalidPath(_)
    ));
    assert!(!vault.exists("../outside.enc").await);
}

#[tokio::test]
async fn tampered_file_fails_decryption() {
    let dir = tempfile::tempdir().unwrap();
    let vault = MediaVault::open(dir.path(), test_key()).await.unwrap();

    let stored = vault.store(b"some audio").await.unwrap();
    let full = dir.path().join(&stored.path);
    let mut frame = std::fs::read(&full).unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0x01;
    std::fs::write(&full, frame).unwrap();

    let err = vault.load(&stored.path).await.unwrap_err();
    assert!(matches!(err, tonegate_delivery::DeliveryError::Crypto(_)));
}

#[tokio::test]
async fn remove_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let vault = MediaVault::open(dir.path(), test_key()).await.unwrap();
    let stored = vault.store(b"gone soon").await.unwrap();
    vault.remove(&stored.path).await.unwrap();
    assert!(!vault.exists(&stored.path).await);
    vault.remove(&stored.path).await.unwrap();
}

// ── Previews ─────────────────────────────────────────────────────────────

#[test]
fn preview_truncates_at_fixed_rate() {
    let data = vec![0u8; PREVIEW_BYTES_PER_SECOND * 10];
    assert_eq!(preview_slice(&data, 3).len(), PREVIEW_BYTES_PER_SECOND * 3);
}

#[test]
fn short_file_previews_whole() {
    let data = vec![0u8; 100];
    assert_eq!(preview_slice(&data, 30).len(), 100);
}

// ── Load counter ─────────────────────────────────────────────────────────

#[test]
fn counter_prunes_outside_window() {
    let counter = LoadCounter::new(Duration::from_secs(60));
    let t0 = Instant::now();
    for i in 0..5 {
        counter.record_start_at(t0 + Duration::from_secs(i));
    }
    assert_eq!(counter.current_at(t0 + Duration::from_secs(10)), 5);
    // First two starts age out of the window.
    assert_eq!(counter.current_at(t0 + Duration::from_secs(61)), 3);
    assert_eq!(counter.current_at(t0 + Duration::from_secs(600)), 0);
}

#[test]
fn eleventh_start_crosses_default_threshold() {
    let config = DeliveryConfig::default();
    let counter = LoadCounter::default();
    let t0 = Instant::now();
    let mut mode = DeliveryMode::Normal;
    for _ in 0..11 {
        let active = counter.record_start_at(t0);
        mode = config.mode_for(active);
    }
    assert_eq!(mode, DeliveryMode::Throttled);
    assert_eq!(config.mode_for(counter.current_at(t0)), DeliveryMode::Throttled);
}

// ── Pacing ───────────────────────────────────────────────────────────────

#[test]
fn throttled_pacer_spaces_chunks() {
    let config = DeliveryConfig::default();
    let pacer = Pacer::new(&config, DeliveryMode::Throttled);
    assert_eq!(pacer.next_delay(Duration::ZERO), Duration::from_millis(35));
}

#[test]
fn normal_pacer_is_unthrottled() {
    let config = DeliveryConfig::default();
    let pacer = Pacer::new(&config, DeliveryMode::Normal);
    assert_eq!(pacer.next_delay(Duration::ZERO), Duration::ZERO);
}

// ── Streaming ────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_delivers_all_bytes_in_order() {
    let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    let config = DeliveryConfig::default();
    let stream = stream_chunks(data.clone(), &config, DeliveryMode::Normal);

    let chunks: Vec<_> = stream.collect().await;
    let mut received = Vec::new();
    for chunk in chunks {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= config.chunk_size);
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, data);
}

#[tokio::test]
async fn dropped_receiver_stops_producer() {
    let data = vec![0u8; 10 * 1024 * 1024];
    let config = DeliveryConfig::default();
    let mut stream = Box::pin(stream_chunks(data, &config, DeliveryMode::Normal));
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.len(), config.chunk_size);
    drop(stream);
    // Producer task notices the closed channel and exits on its own.
    tokio::time::sleep(Duration::from_millis(20)).await;
}
