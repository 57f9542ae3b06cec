//! Error types for media storage and delivery.

use thiserror::Error;
use tonegate_crypto::CryptoError;

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors from the media vault and the streaming path.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Filesystem failure reading or writing vault files.
    #[error("vault i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Encryption or decryption failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The referenced vault file does not exist.
    #[error("media file not found: {0}")]
    NotFound(String),

    /// The path escapes the vault root or is otherwise unusable.
    #[error("invalid vault path: {0}")]
    InvalidPath(String),
}
