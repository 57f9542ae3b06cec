//! Ticket signing and verification.
//!
//! The signature covers the exact string `{payload}{expires_at}`, so any
//! single-bit change to the payload, the expiry, or the signature itself
//! fails verification.

use crate::error::{TicketError, TicketResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A signed, time-bounded credential for one download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// What the ticket authorizes (opaque to the signer).
    pub payload: String,
    /// Expiry as seconds since epoch; signed alongside the payload.
    pub expires_at: i64,
    /// Base64url HMAC-SHA256 signature.
    pub signature: String,
}

/// A stateless signed-path ticket: the resource path travels inside the
/// signed payload, so redemption needs no server-side lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPathTicket {
    /// Base64url-encoded resource path plus optional preview length.
    pub payload: String,
    /// Expiry as seconds since epoch.
    pub expires_at: i64,
    /// Base64url HMAC-SHA256 signature.
    pub signature: String,
}

/// The claim recovered from a verified signed-path ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathClaim {
    /// Opaque path of the encrypted file.
    pub path: String,
    /// Preview length in seconds, when the ticket is preview-limited.
    pub preview_length: Option<u32>,
}

/// Issues and verifies tickets with a server-held secret.
pub struct TicketIssuer {
    secret: Vec<u8>,
}

impl TicketIssuer {
    /// Creates an issuer from the server secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn sign(&self, payload: &str, expires_at: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        mac.update(expires_at.to_string().as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Issues a ticket over an opaque payload, expiring after `ttl`.
    pub fn issue(&self, payload: impl Into<String>, ttl: Duration) -> Ticket {
        self.issue_at(payload, Utc::now() + ttl)
    }

    /// Issues a ticket with an explicit expiry (test seam).
    pub fn issue_at(&self, payload: impl Into<String>, expires_at: DateTime<Utc>) -> Ticket {
        let payload = payload.into();
        let expires_at = expires_at.timestamp();
        let signature = self.sign(&payload, expires_at);
        Ticket {
            payload,
            expires_at,
            signature,
        }
    }

    /// Verifies signature then expiry at the current time.
    ///
    /// The signature comparison is constant-time. Expiry is enforced
    /// server-side regardless of anything the client supplied.
    pub fn verify(&self, payload: &str, expires_at: i64, signature: &str) -> TicketResult<()> {
        self.verify_at(payload, expires_at, signature, Utc::now())
    }

    /// Verifies at an explicit point in time (test seam).
    pub fn verify_at(
        &self,
        payload: &str,
        expires_at: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> TicketResult<()> {
        let sig_bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TicketError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        mac.update(expires_at.to_string().as_bytes());
        mac.verify_slice(&sig_bytes)
            .map_err(|_| TicketError::InvalidSignature)?;

        if now.timestamp() > expires_at {
            return Err(TicketError::Expired);
        }
        Ok(())
    }

    /// Issues a stateless signed-path ticket for an encrypted file.
    pub fn issue_signed_path(
        &self,
        path: &str,
        preview_length: Option<u32>,
        ttl: Duration,
    ) -> SignedPathTicket {
        let encoded = URL_SAFE_NO_PAD.encode(path.as_bytes());
        let payload = match preview_length {
            Some(secs) => format!("{encoded}:{secs}"),
            None => encoded,
        };
        let ticket = self.issue(payload, ttl);
        SignedPathTicket {
            payload: ticket.payload,
            expires_at: ticket.expires_at,
            signature: ticket.signature,
        }
    }

    /// Verifies a signed-path ticket and recovers the path claim.
    pub fn verify_signed_path(&self, ticket: &SignedPathTicket) -> TicketResult<PathClaim> {
        self.verify_signed_path_at(ticket, Utc::now())
    }

    /// Verifies a signed-path ticket at an explicit point in time.
    pub fn verify_signed_path_at(
        &self,
        ticket: &SignedPathTicket,
        now: DateTime<Utc>,
    ) -> TicketResult<PathClaim> {
        self.verify_at(&ticket.payload, ticket.expires_at, &ticket.signature, now)?;

        let (encoded, preview_length) = match ticket.payload.split_once(':') {
            Some((encoded, secs)) => {
                let secs: u32 = secs
                    .parse()
                    .map_err(|_| TicketError::Malformed("bad preview length".to_string()))?;
                (encoded, Some(secs))
            }
            None => (ticket.payload.as_str(), None),
        };
        let path_bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| TicketError::Malformed("bad path encoding".to_string()))?;
        let path = String::from_utf8(path_bytes)
            .map_err(|_| TicketError::Malformed("path is not UTF-8".to_string()))?;

        Ok(PathClaim {
            path,
            preview_length,
        })
    }
}

impl std::fmt::Debug for TicketIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketIssuer")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
