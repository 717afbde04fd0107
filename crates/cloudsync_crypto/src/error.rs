//! Error types for the crypto crate.

use cloudsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while sealing or opening envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key derivation needs a non-empty passphrase.
    #[error("passphrase must not be empty")]
    EmptyPassphrase,

    /// Argon2 rejected its parameters or input.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The cipher refused to encrypt.
    #[error("encryption failed")]
    EncryptionFailed,

    /// Tag verification failed: wrong passphrase or modified data.
    #[error("authentication failed: wrong passphrase or corrupted data")]
    AuthenticationFailed,

    /// The envelope could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
