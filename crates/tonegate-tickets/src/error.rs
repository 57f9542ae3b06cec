//! Error types for ticket issuance and verification.

use thiserror::Error;

/// Result type for ticket operations.
pub type TicketResult<T> = Result<T, TicketError>;

/// Errors from ticket verification.
///
/// The HTTP layer collapses `InvalidSignature` and `Expired` into one
/// 401 so clients cannot probe which check failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TicketError {
    /// Signature does not match payload and expiry (tamper or wrong secret).
    #[error("invalid ticket signature")]
    InvalidSignature,

    /// The ticket's expiry timestamp has passed.
    #[error("ticket expired")]
    Expired,

    /// Cache-backed token has no entry (unknown or already purged).
    #[error("ticket not found")]
    NotFound,

    /// Payload could not be decoded.
    #[error("malformed ticket: {0}")]
    Malformed(String),
}
