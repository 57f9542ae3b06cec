//! Signed, expiring download tickets.
//!
//! A ticket authorizes redemption of one download without re-running the
//! full entitlement check. Signatures are HMAC-SHA256 over
//! `payload ∥ expires_at` with a server-held secret; verification
//! recomputes in constant time, then enforces expiry server-side.
//!
//! Two issuance styles coexist:
//! - **Stateless signed path**: the encoded resource path travels in the
//!   signed payload; no server-side lookup on redemption.
//! - **Cache-backed token**: an opaque random token maps to
//!   {path, preview length, expiry} in a short-lived in-process cache.
//!
//! Neither style can be forged or altered without invalidating the
//! signature. Clients never learn whether a rejected ticket was forged
//! or merely expired.

mod cache;
mod error;
mod ticket;

pub use cache::{CachedHandle, StreamToken, StreamingHandleIssuer, TokenCache};
pub use error::{TicketError, TicketResult};
pub use ticket::{PathClaim, SignedPathTicket, Ticket, TicketIssuer};
