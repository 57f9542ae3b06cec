//! Cache-backed streaming handles.
//!
//! An opaque random token maps to {path, preview length, expiry} in a
//! short-lived in-process cache. The token travels with a signature so a
//! stolen cache key alone is useless, and the cache entry expires with
//! the ticket.

use crate::error::{TicketError, TicketResult};
use crate::ticket::TicketIssuer;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Length of opaque stream tokens.
const TOKEN_LEN: usize = 64;

/// What a cached token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedHandle {
    /// Opaque path of the encrypted file.
    pub path: String,
    /// Preview length in seconds, when preview-limited.
    pub preview_length: Option<u32>,
    /// Expiry as seconds since epoch.
    pub expires_at: i64,
}

/// A redeemable stream token as handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamToken {
    /// Opaque random token.
    pub token: String,
    /// Expiry as seconds since epoch.
    pub expires_at: i64,
    /// Base64url HMAC-SHA256 signature over token and expiry.
    pub signature: String,
}

/// In-process token cache with lazy expiry purging.
#[derive(Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, CachedHandle>>,
}

impl TokenCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedHandle>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores a handle under a fresh random token.
    pub fn put(&self, handle: CachedHandle) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        self.lock().insert(token.clone(), handle);
        token
    }

    /// Fetches a handle if present and unexpired at `now`.
    pub fn get(&self, token: &str, now: DateTime<Utc>) -> Option<CachedHandle> {
        let mut entries = self.lock();
        match entries.get(token) {
            Some(handle) if handle.expires_at >= now.timestamp() => Some(handle.clone()),
            Some(_) => {
                entries.remove(token);
                None
            }
            None => None,
        }
    }

    /// Drops every expired entry. Called opportunistically; correctness
    /// never depends on it.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        self.lock().retain(|_, h| h.expires_at >= now.timestamp());
    }

    /// Number of live entries (expired ones may still be counted until
    /// purged).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Issues and redeems cache-backed streaming handles.
pub struct StreamingHandleIssuer {
    issuer: TicketIssuer,
    cache: TokenCache,
}

impl StreamingHandleIssuer {
    /// Creates an issuer sharing the server ticket secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            issuer: TicketIssuer::new(secret),
            cache: TokenCache::new(),
        }
    }

    /// Issues a short-lived streaming handle for an encrypted file.
    pub fn issue(
        &self,
        path: impl Into<String>,
        preview_length: Option<u32>,
        ttl: Duration,
    ) -> StreamToken {
        let expires_at = (Utc::now() + ttl).timestamp();
        let token = self.cache.put(CachedHandle {
            path: path.into(),
            preview_length,
            expires_at,
        });
        let ticket = self.issuer.issue_at(
            token.clone(),
            DateTime::from_timestamp(expires_at, 0).unwrap_or_else(Utc::now),
        );
        StreamToken {
            token,
            expires_at: ticket.expires_at,
            signature: ticket.signature,
        }
    }

    /// Redeems a streaming handle: signature, expiry, then cache lookup.
    pub fn redeem(
        &self,
        token: &str,
        expires_at: i64,
        signature: &str,
    ) -> TicketResult<CachedHandle> {
        self.redeem_at(token, expires_at, signature, Utc::now())
    }

    /// Redeems at an explicit point in time (test seam).
    pub fn redeem_at(
        &self,
        token: &str,
        expires_at: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> TicketResult<CachedHandle> {
        self.issuer.verify_at(token, expires_at, signature, now)?;
        self.cache.get(token, now).ok_or(TicketError::NotFound)
    }

    /// Drops expired cache entries.
    pub fn purge_expired(&self) {
        self.cache.purge_expired(Utc::now());
    }
}
