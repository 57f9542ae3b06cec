//! Entitlement resolution for Tonegate.
//!
//! Combines subscription state, individual purchases and category grants
//! into a single access decision per (user, resource) pair.
//!
//! # Design Principles
//!
//! - **Read-only**: resolution never writes; it is safe on every request.
//! - **Sweep-independent**: expiry is compared against now at read time,
//!   so a stale `is_active` flag never extends access.
//! - **Most permissive wins**: among matching grants, the one with the
//!   latest expiry is reported; lifetime (no expiry) beats any date.

mod error;
mod resolver;
mod summary;

pub use error::{EntitlementError, EntitlementResult};
pub use resolver::EntitlementResolver;
pub use summary::{AccessSummary, MusicAccessSummary, TtsAccessSummary};
