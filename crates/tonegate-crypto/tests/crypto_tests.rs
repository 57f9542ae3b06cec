//! Cipher and key derivation tests.

use tonegate_crypto::{
    decrypt, derive_vault_key, encrypt, generate_random_key, EncryptedData, KdfParams, Salt,
    NONCE_SIZE, TAG_SIZE,
};

// ── Cipher ───────────────────────────────────────────────────────────────

#[test]
fn encrypt_decrypt_round_trip() {
    let key = generate_random_key();
    let plaintext = b"some audio master bytes";

    let encrypted = encrypt(&key, plaintext).unwrap();
    let decrypted = decrypt(&key, &encrypted).unwrap();
    assert_eq!(decrypted, plaintext);
}

#[test]
fn nonces_are_unique_per_encryption() {
    let key = generate_random_key();
    let a = encrypt(&key, b"same input").unwrap();
    let b = encrypt(&key, b"same input").unwrap();
    assert_ne!(a.nonce, b.nonce);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn wrong_key_fails_decryption() {
    let encrypted = encrypt(&generate_random_key(), b"secret").unwrap();
    assert!(decrypt(&generate_random_key(), &encrypted).is_err());
}

#[test]
fn tampered_ciphertext_fails_decryption() {
    let key = generate_random_key();
    let mut encrypted = encrypt(&key, b"secret").unwrap();
    let last = encrypted.ciphertext.len() - 1;
    encrypted.ciphertext[last] ^= 0x01;
    assert!(decrypt(&key, &encrypted).is_err());
}

#[test]
fn empty_plaintext_round_trips() {
    let key = generate_random_key();
    let encrypted = encrypt(&key, b"").unwrap();
    assert_eq!(decrypt(&key, &encrypted).unwrap(), b"");
}

// ── Frame encoding ───────────────────────────────────────────────────────

#[test]
fn frame_round_trips() {
    let key = generate_random_key();
    let encrypted = encrypt(&key, b"framed audio").unwrap();

    let bytes = encrypted.to_bytes();
    assert_eq!(bytes.len(), NONCE_SIZE + encrypted.ciphertext.len());

    let decoded = EncryptedData::from_bytes(&bytes).unwrap();
    assert_eq!(decrypt(&key, &decoded).unwrap(), b"framed audio");
}

#[test]
fn truncated_frame_is_rejected() {
    assert!(EncryptedData::from_bytes(&[0u8; NONCE_SIZE + TAG_SIZE - 1]).is_err());
}

// ── Key derivation ───────────────────────────────────────────────────────

#[test]
fn same_secret_and_salt_derive_same_key() {
    let salt = Salt::random();
    let params = KdfParams::fast_insecure();
    let a = derive_vault_key("server secret", &salt, &params).unwrap();
    let b = derive_vault_key("server secret", &salt, &params).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
}

#[test]
fn different_salt_derives_different_key() {
    let params = KdfParams::fast_insecure();
    let a = derive_vault_key("server secret", &Salt::random(), &params).unwrap();
    let b = derive_vault_key("server secret", &Salt::random(), &params).unwrap();
    assert_ne!(a.as_bytes(), b.as_bytes());
}

#[test]
fn different_secret_derives_different_key() {
    let salt = Salt::random();
    let params = KdfParams::fast_insecure();
    let a = derive_vault_key("secret one", &salt, &params).unwrap();
    let b = derive_vault_key("secret two", &salt, &params).unwrap();
    assert_ne!(a.as_bytes(), b.as_bytes());
}

#[test]
fn derived_key_encrypts_like_any_other() {
    let key = derive_vault_key("server secret", &Salt::random(), &KdfParams::fast_insecure())
        .unwrap();
    let encrypted = encrypt(&key, b"derived-key audio").unwrap();
    assert_eq!(decrypt(&key, &encrypted).unwrap(), b"derived-key audio");
}
