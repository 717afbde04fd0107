//! The encrypted envelope exchanged with the remote blob endpoint.

use crate::error::{ProtocolError, ProtocolResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Current envelope schema version.
pub const SCHEMA_VERSION: u32 = 1;
/// Size of the AEAD nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the KDF salt in bytes.
pub const SALT_SIZE: usize = 16;
/// Size of the AEAD authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// KDF identifier recorded in every envelope.
pub const KDF_ARGON2ID: &str = "argon2id";

/// Encrypted form of a workspace bundle.
///
/// Binary fields are standard base64. `ciphertext` holds the AEAD output
/// with the 16-byte tag appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// AEAD nonce, base64.
    pub nonce: String,
    /// Ciphertext followed by the authentication tag, base64.
    pub ciphertext: String,
    /// Envelope schema version.
    pub schema_version: u32,
    /// ISO-8601 timestamp stamped at encryption time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// KDF identifier.
    pub kdf: String,
    /// KDF salt, base64.
    pub kdf_salt: String,
}

/// Binary fields of an [`Envelope`] after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEnvelope {
    /// AEAD nonce.
    pub nonce: [u8; NONCE_SIZE],
    /// KDF salt.
    pub salt: [u8; SALT_SIZE],
    /// Ciphertext followed by the tag. Always longer than [`TAG_SIZE`].
    pub ciphertext: Vec<u8>,
    /// Envelope schema version.
    pub schema_version: u32,
    /// Timestamp copied from the envelope.
    pub updated_at: Option<String>,
}

impl Envelope {
    /// Builds an envelope from raw encryption output.
    pub fn encode(
        nonce: &[u8; NONCE_SIZE],
        ciphertext_with_tag: &[u8],
        salt: &[u8; SALT_SIZE],
        schema_version: u32,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext_with_tag),
            schema_version,
            updated_at: Some(format_timestamp(updated_at)),
            kdf: KDF_ARGON2ID.to_string(),
            kdf_salt: STANDARD.encode(salt),
        }
    }

    /// Decodes and validates the binary fields.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedEnvelope`] if a field is not valid
    /// base64, has the wrong length, or the ciphertext cannot hold a tag.
    /// Returns [`ProtocolError::UnsupportedEnvelope`] for an unknown schema
    /// version or KDF.
    pub fn decode(&self) -> ProtocolResult<DecodedEnvelope> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ProtocolError::unsupported_envelope(format!(
                "schema version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        if self.kdf != KDF_ARGON2ID {
            return Err(ProtocolError::unsupported_envelope(format!(
                "kdf {:?}",
                self.kdf
            )));
        }

        let nonce = decode_fixed::<NONCE_SIZE>("nonce", &self.nonce)?;
        let salt = decode_fixed::<SALT_SIZE>("kdfSalt", &self.kdf_salt)?;
        let ciphertext = decode_field("ciphertext", &self.ciphertext)?;

        if ciphertext.len() <= TAG_SIZE {
            return Err(ProtocolError::malformed_envelope(format!(
                "ciphertext is too short ({} bytes)",
                ciphertext.len()
            )));
        }

        Ok(DecodedEnvelope {
            nonce,
            salt,
            ciphertext,
            schema_version: self.schema_version,
            updated_at: self.updated_at.clone(),
        })
    }

    /// Returns `updatedAt` as milliseconds since the Unix epoch.
    ///
    /// A missing or unparsable timestamp counts as the epoch itself.
    pub fn updated_at_millis(&self) -> i64 {
        self.updated_at
            .as_deref()
            .and_then(parse_timestamp_millis)
            .unwrap_or(0)
    }

    /// Parses an envelope from JSON.
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ProtocolError::malformed_envelope(format!("invalid JSON: {}", e)))
    }

    /// Serializes the envelope as pretty-printed JSON.
    pub fn to_json(&self) -> ProtocolResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ProtocolError::malformed_envelope(e.to_string()))
    }
}

/// Formats a timestamp the way envelopes record it (`2024-05-01T10:00:00.000Z`).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 timestamp into epoch milliseconds.
pub fn parse_timestamp_millis(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.timestamp_millis())
}

fn decode_field(name: &str, value: &str) -> ProtocolResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| ProtocolError::malformed_envelope(format!("{} is not valid base64: {}", name, e)))
}

fn decode_fixed<const N: usize>(name: &str, value: &str) -> ProtocolResult<[u8; N]> {
    let bytes = decode_field(name, value)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        ProtocolError::malformed_envelope(format!("{} must be {} bytes, got {}", name, N, len))
    })
}
