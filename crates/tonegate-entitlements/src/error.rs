//! Error types for entitlement resolution.

use thiserror::Error;

/// Result type for entitlement operations.
pub type EntitlementResult<T> = Result<T, EntitlementError>;

/// Errors that can occur while resolving entitlements.
///
/// A denied decision is not an error; it is a normal `AccessDecision`
/// with `allowed = false`. Errors here mean the question could not be
/// answered at all.
#[derive(Debug, Error)]
pub enum EntitlementError {
    /// The underlying store failed.
    #[error("storage error: {0}")]
    Storage(#[from] tonegate_store::StorageError),

    /// A subscription references a plan that does not exist.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
}
