//! Error types for the sync engine.

use cloudsync_crypto::CryptoError;
use cloudsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// The `Display` text of a variant is what ends up in `lastError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The platform cannot encrypt secrets.
    #[error("Secure storage is not available")]
    SecureStorageUnavailable,

    /// AEAD verification failed: wrong passphrase or tampered data.
    #[error("Authentication failed: wrong passphrase or corrupted data")]
    AuthenticationFailed,

    /// The remote envelope could not be decoded.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The remote envelope uses a version or KDF this build cannot read.
    #[error("Unsupported envelope: {0}")]
    UnsupportedEnvelope(String),

    /// The decrypted bundle does not have the expected shape.
    #[error("Malformed workspace bundle: {0}")]
    MalformedBundle(String),

    /// A sync precondition does not hold.
    #[error("{0}")]
    PreconditionNotMet(String),

    /// Network or HTTP error.
    #[error("{message}")]
    Transport {
        /// Error message.
        message: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
    },

    /// Workspace or server storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The live server manager rejected an operation.
    #[error("server manager error: {0}")]
    ServerManager(String),

    /// An operation needs the server manager before `start()` was called.
    #[error("sync engine is not initialized")]
    NotInitialized,

    /// The passphrase cannot be used.
    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(String),

    /// Key derivation or encryption failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Creates a transport error for an unexpected HTTP status.
    pub fn http_status(status: u16, reason: &str) -> Self {
        Self::Transport {
            message: format!("Cloud sync failed: {} {}", status, reason)
                .trim_end()
                .to_string(),
            status: Some(status),
        }
    }

    /// Creates a transport error without a response.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionNotMet(message.into())
    }

    /// Returns true if retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { status: None, .. } => true,
            SyncError::Transport {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            SyncError::TaskFailed(_) => true,
            _ => false,
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MalformedEnvelope { message } => SyncError::MalformedEnvelope(message),
            ProtocolError::UnsupportedEnvelope { message } => {
                SyncError::UnsupportedEnvelope(message)
            }
            ProtocolError::MalformedBundle { message } => SyncError::MalformedBundle(message),
        }
    }
}

impl From<CryptoError> for SyncError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => SyncError::AuthenticationFailed,
            CryptoError::EmptyPassphrase => {
                SyncError::InvalidPassphrase("passphrase must not be empty".into())
            }
            CryptoError::Protocol(inner) => inner.into(),
            other => SyncError::Crypto(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::TaskFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::network("connection reset").is_retryable());
        assert!(SyncError::http_status(503, "Service Unavailable").is_retryable());
        assert!(SyncError::http_status(429, "Too Many Requests").is_retryable());
        assert!(!SyncError::http_status(401, "Unauthorized").is_retryable());
        assert!(!SyncError::AuthenticationFailed.is_retryable());
    }

    #[test]
    fn http_status_message() {
        let err = SyncError::http_status(500, "Internal Server Error");
        assert_eq!(err.to_string(), "Cloud sync failed: 500 Internal Server Error");

        let err = SyncError::http_status(418, "");
        assert_eq!(err.to_string(), "Cloud sync failed: 418");
    }

    #[test]
    fn crypto_errors_map_onto_taxonomy() {
        assert_eq!(
            SyncError::from(CryptoError::AuthenticationFailed),
            SyncError::AuthenticationFailed
        );
        assert!(matches!(
            SyncError::from(CryptoError::Protocol(ProtocolError::malformed_envelope("short"))),
            SyncError::MalformedEnvelope(_)
        ));
        assert!(matches!(
            SyncError::from(CryptoError::EmptyPassphrase),
            SyncError::InvalidPassphrase(_)
        ));
    }

    #[test]
    fn precondition_message_is_verbatim() {
        let err = SyncError::precondition("Passphrase is not set");
        assert_eq!(err.to_string(), "Passphrase is not set");
    }
}
