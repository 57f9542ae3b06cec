//! Encrypted media vault.
//!
//! Media files live on disk under opaque random names, encrypted with
//! the vault key. Clients never see or choose the on-disk path; they
//! only hold the opaque relative path recorded in the catalog.

use crate::error::{DeliveryError, DeliveryResult};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tonegate_crypto::{decrypt, encrypt, EncryptedData, VaultKey};

/// Bytes of decoded audio per second of playback, used to truncate
/// previews.
pub const PREVIEW_BYTES_PER_SECOND: usize = 16_000;

/// Metadata recorded when a file is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// Opaque path relative to the vault root.
    pub path: String,
    /// Plaintext size in bytes.
    pub bytes: u64,
    /// Hex SHA-256 of the plaintext.
    pub sha256: String,
}

/// Encrypting file store rooted at a single directory.
pub struct MediaVault {
    root: PathBuf,
    key: VaultKey,
}

impl MediaVault {
    /// Opens a vault at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>, key: VaultKey) -> DeliveryResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, key })
    }

    /// Encrypts and stores plaintext under a fresh opaque name.
    pub async fn store(&self, plaintext: &[u8]) -> DeliveryResult<StoredMedia> {
        let mut name_bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut name_bytes);
        let name = hex_string(&name_bytes);
        // Two-level sharding keeps directories small.
        let rel = format!("{}/{}.enc", &name[..2], &name[2..]);

        let encrypted = encrypt(&self.key, plaintext)?;
        let full = self.root.join(&rel);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, encrypted.to_bytes()).await?;

        let sha256 = hex_string(&Sha256::digest(plaintext));
        Ok(StoredMedia {
            path: rel,
            bytes: plaintext.len() as u64,
            sha256,
        })
    }

    /// Loads and decrypts a vault file by its opaque relative path.
    pub async fn load(&self, path: &str) -> DeliveryResult<Vec<u8>> {
        let full = self.resolve(path)?;
        let frame = match tokio::fs::read(&full).await {
            Ok(frame) => frame,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeliveryError::NotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let encrypted = EncryptedData::from_bytes(&frame)?;
        Ok(decrypt(&self.key, &encrypted)?)
    }

    /// Returns true if the vault file exists on disk.
    pub async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(&full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Removes a vault file. Missing files are not an error.
    pub async fn remove(&self, path: &str) -> DeliveryResult<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, path: &str) -> DeliveryResult<PathBuf> {
        let rel = Path::new(path);
        let safe = rel.components().all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(DeliveryError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl std::fmt::Debug for MediaVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaVault")
            .field("root", &self.root)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Truncates decoded audio to a preview window.
///
/// Truncation uses a fixed bytes-per-second estimate; a short file is
/// returned whole.
#[must_use]
pub fn preview_slice(data: &[u8], preview_secs: u32) -> &[u8] {
    let limit = (preview_secs as usize).saturating_mul(PREVIEW_BYTES_PER_SECOND);
    &data[..limit.min(data.len())]
}

fn hex_string(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
