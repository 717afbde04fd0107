//! Collaborators the sync engine depends on.
//!
//! The engine never talks to a database, keychain or process supervisor
//! directly. Hosts implement these traits and hand them to
//! [`crate::SyncEngine`] through [`crate::SyncServices`]; the `memory`
//! module provides in-process implementations for tests and tooling.

use crate::error::SyncResult;
use crate::state::Settings;
use async_trait::async_trait;
use cloudsync_protocol::McpServerConfig;
use std::sync::Arc;

/// Kind of workspace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkspaceType {
    /// Servers are stored on this machine.
    Local,
    /// Servers are served by a remote API.
    Remote,
}

/// Connection details of a remote workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL of the remote API.
    pub api_url: String,
}

impl RemoteConfig {
    /// Creates a remote config.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
        }
    }
}

/// A stored workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Local or remote.
    pub workspace_type: WorkspaceType,
    /// Present for remote workspaces.
    pub remote_config: Option<RemoteConfig>,
}

impl Workspace {
    /// Creates a local workspace record.
    pub fn local(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            workspace_type: WorkspaceType::Local,
            remote_config: None,
        }
    }

    /// Creates a remote workspace record.
    pub fn remote(id: impl Into<String>, name: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            workspace_type: WorkspaceType::Remote,
            remote_config: Some(RemoteConfig::new(api_url)),
        }
    }
}

/// Field changes applied to an existing workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceUpdate {
    /// New display name.
    pub name: String,
    /// New type.
    pub workspace_type: WorkspaceType,
    /// New remote config; `None` clears it.
    pub remote_config: Option<RemoteConfig>,
}

/// OS-backed secret encryption (keychain, DPAPI, libsecret, ...).
///
/// Blobs produced by `encrypt_string` are only decryptable on the machine
/// and account that produced them.
pub trait SecureStorage: Send + Sync {
    /// Returns true if the platform can encrypt secrets right now.
    fn is_encryption_available(&self) -> bool;

    /// Encrypts a string into an opaque blob.
    fn encrypt_string(&self, plaintext: &str) -> SyncResult<Vec<u8>>;

    /// Decrypts a blob produced by [`SecureStorage::encrypt_string`].
    fn decrypt_string(&self, blob: &[u8]) -> SyncResult<String>;
}

/// Persistent application settings.
pub trait SettingsStore: Send + Sync {
    /// Loads the current settings.
    fn load(&self) -> SyncResult<Settings>;

    /// Replaces the stored settings.
    fn save(&self, settings: &Settings) -> SyncResult<()>;
}

/// Source of the user's bearer token.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns the current token, or `None` when signed out.
    async fn auth_token(&self) -> Option<String>;
}

/// Workspace metadata storage.
pub trait WorkspaceStore: Send + Sync {
    /// Lists all workspaces in storage order.
    fn list(&self) -> SyncResult<Vec<Workspace>>;

    /// Looks up a workspace by id.
    fn find_by_id(&self, id: &str) -> SyncResult<Option<Workspace>>;

    /// Inserts a new workspace.
    fn create(&self, workspace: &Workspace) -> SyncResult<()>;

    /// Updates an existing workspace.
    fn update(&self, id: &str, update: &WorkspaceUpdate) -> SyncResult<()>;

    /// Deletes a workspace and its servers.
    fn delete(&self, id: &str) -> SyncResult<()>;

    /// Id of the workspace whose servers are currently running, if any.
    fn active_workspace_id(&self) -> SyncResult<Option<String>>;

    /// Server storage of one workspace.
    fn server_repository(&self, workspace_id: &str) -> SyncResult<Arc<dyn ServerRepository>>;
}

/// Per-workspace server storage.
pub trait ServerRepository: Send + Sync {
    /// Returns all stored servers in storage order.
    fn get_all_servers(&self) -> SyncResult<Vec<McpServerConfig>>;

    /// Runs `f` inside a storage transaction.
    ///
    /// If `f` returns an error nothing it did is persisted and the error is
    /// returned unchanged.
    fn transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn ServerTransaction) -> SyncResult<()>,
    ) -> SyncResult<()>;
}

/// Writes available inside [`ServerRepository::transaction`].
pub trait ServerTransaction {
    /// Removes every server row.
    fn delete_all(&mut self) -> SyncResult<()>;

    /// Inserts one server.
    fn add_server(&mut self, server: &McpServerConfig) -> SyncResult<()>;
}

/// Live server supervisor of the active workspace.
///
/// Adding or removing a server here also starts or stops its process, and
/// must persist the change to the active workspace's [`ServerRepository`].
/// Pushes export servers from repositories, so a change kept only in the
/// running set would be reverted by the next push.
#[async_trait]
pub trait ServerManager: Send + Sync {
    /// Returns the servers currently managed.
    async fn get_servers(&self) -> SyncResult<Vec<McpServerConfig>>;

    /// Registers a server.
    async fn add_server(&self, server: McpServerConfig) -> SyncResult<()>;

    /// Unregisters a server by id.
    async fn remove_server(&self, id: &str) -> SyncResult<()>;
}
