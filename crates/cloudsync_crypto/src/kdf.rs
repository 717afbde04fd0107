//! Argon2id key derivation.
//!
//! The cost parameters are fixed. Envelopes record only the salt and the
//! algorithm tag, so every build must derive with the same constants.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use cloudsync_protocol::SALT_SIZE;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Argon2 memory cost in KiB (64 MiB).
pub const KDF_MEMORY_COST_KIB: u32 = 65_536;
/// Argon2 passes over memory.
pub const KDF_TIME_COST: u32 = 3;
/// Argon2 lanes.
pub const KDF_PARALLELISM: u32 = 1;
/// Argon2 output length in bytes.
pub const KDF_OUTPUT_LEN: usize = KEY_SIZE;

/// Symmetric key for AES-256-GCM.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this method - don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derives a 256-bit key from a passphrase and salt with Argon2id.
///
/// # Errors
///
/// Returns [`CryptoError::EmptyPassphrase`] for an empty passphrase and
/// [`CryptoError::KeyDerivation`] if Argon2 fails.
pub fn derive_key(passphrase: &str, salt: &[u8; SALT_SIZE]) -> CryptoResult<EncryptionKey> {
    if passphrase.is_empty() {
        return Err(CryptoError::EmptyPassphrase);
    }

    let params = Params::new(
        KDF_MEMORY_COST_KIB,
        KDF_TIME_COST,
        KDF_PARALLELISM,
        Some(KDF_OUTPUT_LEN),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut bytes = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut bytes)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(EncryptionKey { bytes })
}
