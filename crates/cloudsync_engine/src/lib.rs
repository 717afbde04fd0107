//! # CloudSync Engine
//!
//! End-to-end encrypted synchronization of workspace and server
//! configuration through a single remote blob.
//!
//! This crate provides:
//! - The sync orchestrator ([`SyncEngine`]) with background polling
//! - Pull/push decision by comparing the remote `updatedAt` with the last
//!   local sync
//! - Reconciliation of a pulled bundle into workspace storage
//! - Passphrase storage through platform secure storage
//! - HTTP transport abstraction
//! - In-memory collaborators for tests and tooling
//!
//! ## Architecture
//!
//! The remote holds one envelope per account. Each attempt either:
//! 1. Pulls, when the remote envelope is strictly newer than the last sync,
//!    replacing local workspaces with the decrypted bundle
//! 2. Pushes otherwise, sealing the local bundle into a fresh envelope
//!
//! ## Key Invariants
//!
//! - The passphrase never leaves the machine
//! - At most one attempt runs at a time
//! - Failures are recorded in `lastError`, never raised from `sync_now`
//! - The default workspace is never deleted
//! - Inactive workspaces are replaced atomically

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod http;
pub mod memory;
mod reconciler;
mod services;
mod state;
mod transport;
mod vault;

pub use config::{SyncConfig, BLOB_PATH, DEFAULT_POLLING_INTERVAL};
pub use engine::{SyncEngine, SyncServices};
pub use error::{SyncError, SyncResult};
#[cfg(feature = "reqwest-client")]
pub use http::ReqwestClient;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use reconciler::Reconciler;
pub use services::{
    AuthProvider, RemoteConfig, SecureStorage, ServerManager, ServerRepository, ServerTransaction,
    SettingsStore, Workspace, WorkspaceStore, WorkspaceType, WorkspaceUpdate,
};
pub use state::{EngineState, Settings, SkipReason, SyncOutcome, SyncState, SyncStatus};
pub use transport::{BlobTransport, MockTransport};
pub use vault::PassphraseVault;
