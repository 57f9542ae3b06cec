//! Ticket signing, verification, and cache-backed handle tests.

use chrono::{Duration, Utc};
use tonegate_tickets::{SignedPathTicket, StreamingHandleIssuer, TicketError, TicketIssuer};

// ── Sign and verify ──────────────────────────────────────────────────────

#[test]
fn issued_ticket_verifies() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let ticket = issuer.issue("download:42", Duration::minutes(30));
    assert!(issuer
        .verify(&ticket.payload, ticket.expires_at, &ticket.signature)
        .is_ok());
}

#[test]
fn tampered_payload_is_rejected() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let ticket = issuer.issue("download:42", Duration::minutes(30));
    let err = issuer
        .verify("download:43", ticket.expires_at, &ticket.signature)
        .unwrap_err();
    assert_eq!(err, TicketError::InvalidSignature);
}

#[test]
fn tampered_expiry_is_rejected() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let ticket = issuer.issue("download:42", Duration::minutes(30));
    // Extending the expiry by one second invalidates the signature.
    let err = issuer
        .verify(&ticket.payload, ticket.expires_at + 1, &ticket.signature)
        .unwrap_err();
    assert_eq!(err, TicketError::InvalidSignature);
}

#[test]
fn tampered_signature_is_rejected() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let ticket = issuer.issue("download:42", Duration::minutes(30));
    let mut sig = ticket.signature.into_bytes();
    // Flip one bit of the first signature byte.
    sig[0] ^= 0x01;
    let sig = String::from_utf8(sig).unwrap();
    let err = issuer
        .verify(&ticket.payload, ticket.expires_at, &sig)
        .unwrap_err();
    assert_eq!(err, TicketError::InvalidSignature);
}

#[test]
fn wrong_secret_is_rejected() {
    let signer = TicketIssuer::new(b"server-secret".to_vec());
    let other = TicketIssuer::new(b"other-secret".to_vec());
    let ticket = signer.issue("download:42", Duration::minutes(30));
    let err = other
        .verify(&ticket.payload, ticket.expires_at, &ticket.signature)
        .unwrap_err();
    assert_eq!(err, TicketError::InvalidSignature);
}

#[test]
fn valid_signature_past_expiry_is_expired() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let ticket = issuer.issue_at("download:42", Utc::now() - Duration::seconds(5));
    let err = issuer
        .verify(&ticket.payload, ticket.expires_at, &ticket.signature)
        .unwrap_err();
    assert_eq!(err, TicketError::Expired);
}

#[test]
fn verification_at_exact_expiry_still_passes() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let now = Utc::now();
    let ticket = issuer.issue_at("download:42", now);
    assert!(issuer
        .verify_at(&ticket.payload, ticket.expires_at, &ticket.signature, now)
        .is_ok());
}

#[test]
fn garbage_signature_encoding_is_rejected() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let ticket = issuer.issue("download:42", Duration::minutes(30));
    let err = issuer
        .verify(&ticket.payload, ticket.expires_at, "not base64 !!!")
        .unwrap_err();
    assert_eq!(err, TicketError::InvalidSignature);
}

// ── Signed-path tickets ──────────────────────────────────────────────────

#[test]
fn signed_path_round_trips() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let ticket = issuer.issue_signed_path("vault/ab/cdef.enc", None, Duration::minutes(30));
    let claim = issuer.verify_signed_path(&ticket).unwrap();
    assert_eq!(claim.path, "vault/ab/cdef.enc");
    assert_eq!(claim.preview_length, None);
}

#[test]
fn signed_path_carries_preview_length() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let ticket = issuer.issue_signed_path("vault/ab/cdef.enc", Some(30), Duration::minutes(30));
    let claim = issuer.verify_signed_path(&ticket).unwrap();
    assert_eq!(claim.preview_length, Some(30));
}

#[test]
fn signed_path_with_swapped_payload_is_rejected() {
    let issuer = TicketIssuer::new(b"server-secret".to_vec());
    let real = issuer.issue_signed_path("vault/ab/cdef.enc", None, Duration::minutes(30));
    let other = issuer.issue_signed_path("vault/zz/other.enc", None, Duration::minutes(30));
    let forged = SignedPathTicket {
        payload: other.payload,
        expires_at: real.expires_at,
        signature: real.signature,
    };
    let err = issuer.verify_signed_path(&forged).unwrap_err();
    assert_eq!(err, TicketError::InvalidSignature);
}

// ── Cache-backed handles ─────────────────────────────────────────────────

#[test]
fn stream_token_redeems_to_cached_handle() {
    let issuer = StreamingHandleIssuer::new(b"server-secret".to_vec());
    let token = issuer.issue("vault/ab/cdef.enc", Some(30), Duration::minutes(30));
    assert_eq!(token.token.len(), 64);

    let handle = issuer
        .redeem(&token.token, token.expires_at, &token.signature)
        .unwrap();
    assert_eq!(handle.path, "vault/ab/cdef.enc");
    assert_eq!(handle.preview_length, Some(30));
}

#[test]
fn unknown_token_with_valid_signature_is_not_found() {
    let issuer = StreamingHandleIssuer::new(b"server-secret".to_vec());
    // Sign a token that was never placed in the cache.
    let raw = TicketIssuer::new(b"server-secret".to_vec());
    let ticket = raw.issue("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", Duration::minutes(30));
    let err = issuer
        .redeem(&ticket.payload, ticket.expires_at, &ticket.signature)
        .unwrap_err();
    assert_eq!(err, TicketError::NotFound);
}

#[test]
fn forged_stream_token_is_rejected_before_cache_lookup() {
    let issuer = StreamingHandleIssuer::new(b"server-secret".to_vec());
    let token = issuer.issue("vault/ab/cdef.enc", None, Duration::minutes(30));
    let err = issuer
        .redeem(&token.token, token.expires_at + 60, &token.signature)
        .unwrap_err();
    assert_eq!(err, TicketError::InvalidSignature);
}

#[test]
fn expired_handle_is_purged_on_lookup() {
    let issuer = StreamingHandleIssuer::new(b"server-secret".to_vec());
    let token = issuer.issue("vault/ab/cdef.enc", None, Duration::minutes(30));
    let later = Utc::now() + Duration::hours(1);
    let err = issuer
        .redeem_at(&token.token, token.expires_at, &token.signature, later)
        .unwrap_err();
    assert_eq!(err, TicketError::Expired);
}

#[test]
fn tokens_are_unique_per_issue() {
    let issuer = StreamingHandleIssuer::new(b"server-secret".to_vec());
    let a = issuer.issue("vault/a.enc", None, Duration::minutes(30));
    let b = issuer.issue("vault/a.enc", None, Duration::minutes(30));
    assert_ne!(a.token, b.token);
}
