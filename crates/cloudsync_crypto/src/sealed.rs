//! Sealing plaintext into envelopes and opening them again.

use crate::cipher;
use crate::error::CryptoResult;
use crate::kdf::derive_key;
use chrono::{DateTime, Utc};
use cloudsync_protocol::{Envelope, NONCE_SIZE, SALT_SIZE, SCHEMA_VERSION};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// Encrypts `plaintext` under `passphrase` into a fresh envelope.
///
/// A new random nonce and salt are drawn on every call, so sealing the same
/// plaintext twice never produces the same envelope.
pub fn seal(passphrase: &str, plaintext: &[u8], updated_at: DateTime<Utc>) -> CryptoResult<Envelope> {
    let mut nonce = [0u8; NONCE_SIZE];
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut nonce);
    OsRng.fill_bytes(&mut salt);

    seal_with(passphrase, plaintext, &nonce, &salt, updated_at)
}

/// Encrypts with a caller-supplied nonce and salt.
///
/// Only for fixtures and benchmarks: reusing a nonce under the same key
/// breaks AES-GCM.
pub fn seal_with(
    passphrase: &str,
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    salt: &[u8; SALT_SIZE],
    updated_at: DateTime<Utc>,
) -> CryptoResult<Envelope> {
    let key = derive_key(passphrase, salt)?;
    let ciphertext = cipher::encrypt(&key, nonce, plaintext)?;
    Ok(Envelope::encode(
        nonce,
        &ciphertext,
        salt,
        SCHEMA_VERSION,
        updated_at,
    ))
}

/// Decrypts an envelope with `passphrase`.
///
/// # Errors
///
/// Structural problems surface as [`crate::CryptoError::Protocol`] before
/// any key is derived. A wrong passphrase and a modified envelope both
/// yield [`crate::CryptoError::AuthenticationFailed`].
pub fn open(passphrase: &str, envelope: &Envelope) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let decoded = envelope.decode()?;
    let key = derive_key(passphrase, &decoded.salt)?;
    let plaintext = cipher::decrypt(&key, &decoded.nonce, &decoded.ciphertext)?;
    Ok(Zeroizing::new(plaintext))
}
