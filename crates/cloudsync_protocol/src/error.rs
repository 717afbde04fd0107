//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding envelopes or parsing bundles.
///
/// None of these are ever partially applied: a structure that fails
/// validation is rejected as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The envelope could not be decoded into its binary fields.
    #[error("malformed envelope: {message}")]
    MalformedEnvelope {
        /// Description of the problem.
        message: String,
    },

    /// The envelope is well formed but uses a version or KDF this build cannot read.
    #[error("unsupported envelope: {message}")]
    UnsupportedEnvelope {
        /// Description of the problem.
        message: String,
    },

    /// The decrypted bundle does not have the expected shape.
    #[error("malformed workspace bundle: {message}")]
    MalformedBundle {
        /// Description of the problem.
        message: String,
    },
}

impl ProtocolError {
    /// Creates a malformed envelope error.
    pub fn malformed_envelope(message: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            message: message.into(),
        }
    }

    /// Creates an unsupported envelope error.
    pub fn unsupported_envelope(message: impl Into<String>) -> Self {
        Self::UnsupportedEnvelope {
            message: message.into(),
        }
    }

    /// Creates a malformed bundle error.
    pub fn malformed_bundle(message: impl Into<String>) -> Self {
        Self::MalformedBundle {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::malformed_envelope("nonce is not valid base64");
        assert_eq!(
            err.to_string(),
            "malformed envelope: nonce is not valid base64"
        );

        let err = ProtocolError::malformed_bundle("workspaces must be a list");
        assert!(err.to_string().contains("workspaces must be a list"));
    }
}
