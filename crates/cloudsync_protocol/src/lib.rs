//! # CloudSync Protocol
//!
//! Wire formats for CloudSync.
//!
//! This crate provides:
//! - [`Envelope`], the encrypted blob exchanged with the remote endpoint
//! - [`WorkspaceBundle`], the plaintext carried inside an envelope
//! - [`McpServerConfig`], the server records owned by local workspaces
//!
//! This is a pure data crate with no I/O operations. Encryption lives in
//! `cloudsync_crypto`; this crate only moves bytes between their typed and
//! their base64/JSON representations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bundle;
mod envelope;
mod error;
mod server;

pub use bundle::{WorkspaceBundle, WorkspaceBundleEntry, WorkspaceContent, DEFAULT_WORKSPACE_ID};
pub use envelope::{
    format_timestamp, parse_timestamp_millis, DecodedEnvelope, Envelope, KDF_ARGON2ID, NONCE_SIZE,
    SALT_SIZE, SCHEMA_VERSION, TAG_SIZE,
};
pub use error::{ProtocolError, ProtocolResult};
pub use server::{McpServerConfig, ServerType};
