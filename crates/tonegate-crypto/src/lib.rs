//! Media encryption layer for Tonegate.
//!
//! Audio masters are stored encrypted at rest and only decrypted inside
//! the delivery path. This raises the cost of casual redistribution; it is
//! not DRM against an attacker with local file access.
//!
//! - ChaCha20-Poly1305 for authenticated encryption
//! - Argon2id to derive the vault key from the configured server secret

mod cipher;
mod error;
mod key;

pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_vault_key, generate_random_key, KdfParams, Salt, VaultKey, KEY_SIZE, SALT_SIZE};
