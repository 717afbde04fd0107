//! In-memory collaborators.
//!
//! Useful for testing and tooling. Each type can be told to fail at a
//! chosen point so rollback and abort paths can be exercised.

use crate::error::{SyncError, SyncResult};
use crate::services::{
    AuthProvider, SecureStorage, ServerManager, ServerRepository, ServerTransaction,
    SettingsStore, Workspace, WorkspaceStore, WorkspaceUpdate,
};
use crate::state::Settings;
use async_trait::async_trait;
use cloudsync_protocol::{McpServerConfig, DEFAULT_WORKSPACE_ID};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Settings held in memory.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<Settings>,
    saves: AtomicUsize,
}

impl MemorySettingsStore {
    /// Creates a store with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given settings.
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
            saves: AtomicUsize::new(0),
        }
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Sets the subscription status.
    pub fn set_subscription_status(&self, status: Option<&str>) {
        self.settings.write().subscription_status = status.map(str::to_string);
    }

    /// Number of saves performed through [`SettingsStore::save`].
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> SyncResult<Settings> {
        Ok(self.settings.read().clone())
    }

    fn save(&self, settings: &Settings) -> SyncResult<()> {
        *self.settings.write() = settings.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

const SEALED_PREFIX: &[u8] = b"sealed:";
const SEALED_MASK: u8 = 0x5a;

/// Reversible stand-in for OS secret storage.
///
/// Only blobs it produced itself decrypt successfully.
#[derive(Debug)]
pub struct MemorySecureStorage {
    available: AtomicBool,
}

impl MemorySecureStorage {
    /// Creates an available storage.
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    /// Toggles availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for MemorySecureStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStorage for MemorySecureStorage {
    fn is_encryption_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn encrypt_string(&self, plaintext: &str) -> SyncResult<Vec<u8>> {
        if !self.is_encryption_available() {
            return Err(SyncError::SecureStorageUnavailable);
        }
        let mut blob = SEALED_PREFIX.to_vec();
        blob.extend(plaintext.bytes().map(|b| b ^ SEALED_MASK));
        Ok(blob)
    }

    fn decrypt_string(&self, blob: &[u8]) -> SyncResult<String> {
        if !self.is_encryption_available() {
            return Err(SyncError::SecureStorageUnavailable);
        }
        let body = blob
            .strip_prefix(SEALED_PREFIX)
            .ok_or_else(|| SyncError::storage("blob was not sealed by this storage"))?;
        String::from_utf8(body.iter().map(|b| b ^ SEALED_MASK).collect())
            .map_err(|e| SyncError::storage(e.to_string()))
    }
}

/// Auth provider returning a fixed, replaceable token.
#[derive(Debug, Default)]
pub struct StaticAuthProvider {
    token: RwLock<Option<String>>,
}

impl StaticAuthProvider {
    /// Creates a signed-in provider.
    pub fn signed_in(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Creates a signed-out provider.
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Replaces the token.
    pub fn set_token(&self, token: Option<&str>) {
        *self.token.write() = token.map(str::to_string);
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn auth_token(&self) -> Option<String> {
        self.token.read().clone()
    }
}

/// Server rows of one workspace, with all-or-nothing transactions.
#[derive(Debug, Default)]
pub struct MemoryServerRepository {
    servers: Mutex<Vec<McpServerConfig>>,
    fail_after_adds: Mutex<Option<usize>>,
}

impl MemoryServerRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed servers.
    pub fn servers(&self) -> Vec<McpServerConfig> {
        self.servers.lock().clone()
    }

    /// Replaces the committed servers.
    pub fn set_servers(&self, servers: Vec<McpServerConfig>) {
        *self.servers.lock() = servers;
    }

    /// Makes `add_server` fail once `count` servers were added in a
    /// transaction. `None` disables the failure.
    pub fn fail_after_adds(&self, count: Option<usize>) {
        *self.fail_after_adds.lock() = count;
    }
}

struct StagedServers {
    servers: Vec<McpServerConfig>,
    adds: usize,
    fail_after_adds: Option<usize>,
}

impl ServerTransaction for StagedServers {
    fn delete_all(&mut self) -> SyncResult<()> {
        self.servers.clear();
        Ok(())
    }

    fn add_server(&mut self, server: &McpServerConfig) -> SyncResult<()> {
        if self.fail_after_adds == Some(self.adds) {
            return Err(SyncError::storage(format!(
                "failed to insert server {}",
                server.id
            )));
        }
        if self.servers.iter().any(|s| s.id == server.id) {
            return Err(SyncError::storage(format!("duplicate server id {}", server.id)));
        }
        self.servers.push(server.clone());
        self.adds += 1;
        Ok(())
    }
}

impl ServerRepository for MemoryServerRepository {
    fn get_all_servers(&self) -> SyncResult<Vec<McpServerConfig>> {
        Ok(self.servers())
    }

    fn transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn ServerTransaction) -> SyncResult<()>,
    ) -> SyncResult<()> {
        let mut committed = self.servers.lock();
        let mut staged = StagedServers {
            servers: committed.clone(),
            adds: 0,
            fail_after_adds: *self.fail_after_adds.lock(),
        };

        f(&mut staged)?;

        *committed = staged.servers;
        Ok(())
    }
}

#[derive(Debug)]
struct WorkspaceTable {
    workspaces: Vec<Workspace>,
    repositories: HashMap<String, Arc<MemoryServerRepository>>,
    active: Option<String>,
}

/// Workspace records held in memory.
///
/// Starts with the local default workspace, which is also active.
#[derive(Debug)]
pub struct MemoryWorkspaceStore {
    table: RwLock<WorkspaceTable>,
}

impl MemoryWorkspaceStore {
    /// Creates a store holding only the default workspace.
    pub fn new() -> Self {
        let mut repositories = HashMap::new();
        repositories.insert(
            DEFAULT_WORKSPACE_ID.to_string(),
            Arc::new(MemoryServerRepository::new()),
        );
        Self {
            table: RwLock::new(WorkspaceTable {
                workspaces: vec![Workspace::local(DEFAULT_WORKSPACE_ID, "Default")],
                repositories,
                active: Some(DEFAULT_WORKSPACE_ID.to_string()),
            }),
        }
    }

    /// Changes the active workspace.
    pub fn set_active(&self, id: Option<&str>) {
        self.table.write().active = id.map(str::to_string);
    }

    /// Returns the concrete repository of a workspace.
    pub fn repository(&self, id: &str) -> Option<Arc<MemoryServerRepository>> {
        self.table.read().repositories.get(id).cloned()
    }

    /// Returns all workspaces.
    pub fn workspaces(&self) -> Vec<Workspace> {
        self.table.read().workspaces.clone()
    }
}

impl Default for MemoryWorkspaceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceStore for MemoryWorkspaceStore {
    fn list(&self) -> SyncResult<Vec<Workspace>> {
        Ok(self.workspaces())
    }

    fn find_by_id(&self, id: &str) -> SyncResult<Option<Workspace>> {
        Ok(self
            .table
            .read()
            .workspaces
            .iter()
            .find(|w| w.id == id)
            .cloned())
    }

    fn create(&self, workspace: &Workspace) -> SyncResult<()> {
        let mut table = self.table.write();
        if table.workspaces.iter().any(|w| w.id == workspace.id) {
            return Err(SyncError::storage(format!(
                "workspace {} already exists",
                workspace.id
            )));
        }
        table.workspaces.push(workspace.clone());
        table
            .repositories
            .insert(workspace.id.clone(), Arc::new(MemoryServerRepository::new()));
        Ok(())
    }

    fn update(&self, id: &str, update: &WorkspaceUpdate) -> SyncResult<()> {
        let mut table = self.table.write();
        let workspace = table
            .workspaces
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| SyncError::storage(format!("workspace {} not found", id)))?;
        workspace.name = update.name.clone();
        workspace.workspace_type = update.workspace_type;
        workspace.remote_config = update.remote_config.clone();
        Ok(())
    }

    fn delete(&self, id: &str) -> SyncResult<()> {
        let mut table = self.table.write();
        table.workspaces.retain(|w| w.id != id);
        table.repositories.remove(id);
        if table.active.as_deref() == Some(id) {
            table.active = None;
        }
        Ok(())
    }

    fn active_workspace_id(&self) -> SyncResult<Option<String>> {
        Ok(self.table.read().active.clone())
    }

    fn server_repository(&self, workspace_id: &str) -> SyncResult<Arc<dyn ServerRepository>> {
        let repository: Arc<dyn ServerRepository> = self
            .repository(workspace_id)
            .ok_or_else(|| SyncError::storage(format!("workspace {} not found", workspace_id)))?;
        Ok(repository)
    }
}

/// Live server set of the active workspace.
///
/// Reads and writes go straight to the workspace's repository, so what the
/// manager runs is what a later export sees.
#[derive(Debug, Default)]
pub struct MemoryServerManager {
    repository: Arc<MemoryServerRepository>,
    failing_adds: Mutex<Vec<String>>,
}

impl MemoryServerManager {
    /// Creates a manager backed by a workspace repository.
    pub fn new(repository: Arc<MemoryServerRepository>) -> Self {
        Self {
            repository,
            failing_adds: Mutex::new(Vec::new()),
        }
    }

    /// Creates a manager over a standalone repository holding `servers`.
    pub fn with_servers(servers: Vec<McpServerConfig>) -> Self {
        let repository = Arc::new(MemoryServerRepository::new());
        repository.set_servers(servers);
        Self::new(repository)
    }

    /// Returns the running servers.
    pub fn servers(&self) -> Vec<McpServerConfig> {
        self.repository.servers()
    }

    /// Returns the backing repository.
    pub fn repository(&self) -> &Arc<MemoryServerRepository> {
        &self.repository
    }

    /// Makes adding the server with `id` fail.
    pub fn fail_add(&self, id: impl Into<String>) {
        self.failing_adds.lock().push(id.into());
    }
}

#[async_trait]
impl ServerManager for MemoryServerManager {
    async fn get_servers(&self) -> SyncResult<Vec<McpServerConfig>> {
        Ok(self.servers())
    }

    async fn add_server(&self, server: McpServerConfig) -> SyncResult<()> {
        if self.failing_adds.lock().contains(&server.id) {
            return Err(SyncError::ServerManager(format!(
                "failed to start server {}",
                server.id
            )));
        }
        let mut servers = self.repository.servers.lock();
        if servers.iter().any(|s| s.id == server.id) {
            return Err(SyncError::ServerManager(format!(
                "server {} is already running",
                server.id
            )));
        }
        servers.push(server);
        Ok(())
    }

    async fn remove_server(&self, id: &str) -> SyncResult<()> {
        let mut servers = self.repository.servers.lock();
        let before = servers.len();
        servers.retain(|s| s.id != id);
        if servers.len() == before {
            return Err(SyncError::ServerManager(format!("server {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str) -> McpServerConfig {
        McpServerConfig::local(id, id, "npx")
    }

    #[test]
    fn secure_storage_roundtrip() {
        let storage = MemorySecureStorage::new();
        let blob = storage.encrypt_string("pw").unwrap();
        assert_ne!(blob, b"pw");
        assert_eq!(storage.decrypt_string(&blob).unwrap(), "pw");
        assert!(storage.decrypt_string(b"pw").is_err());
    }

    #[test]
    fn transaction_commits_on_success() {
        let repo = MemoryServerRepository::new();
        repo.set_servers(vec![server("a")]);

        repo.transaction(&mut |tx: &mut dyn ServerTransaction| {
            tx.delete_all()?;
            tx.add_server(&server("b"))?;
            tx.add_server(&server("c"))
        })
        .unwrap();

        let ids: Vec<_> = repo.servers().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn transaction_discards_on_failure() {
        let repo = MemoryServerRepository::new();
        repo.set_servers(vec![server("a")]);
        repo.fail_after_adds(Some(1));

        let err = repo
            .transaction(&mut |tx: &mut dyn ServerTransaction| {
                tx.delete_all()?;
                tx.add_server(&server("b"))?;
                tx.add_server(&server("c"))
            })
            .unwrap_err();

        assert!(matches!(err, SyncError::Storage(_)));
        assert_eq!(repo.servers(), vec![server("a")]);
    }

    #[test]
    fn workspace_store_starts_with_default() {
        let store = MemoryWorkspaceStore::new();
        assert_eq!(
            store.active_workspace_id().unwrap().as_deref(),
            Some(DEFAULT_WORKSPACE_ID)
        );
        assert!(store.find_by_id(DEFAULT_WORKSPACE_ID).unwrap().is_some());
        assert!(store.server_repository(DEFAULT_WORKSPACE_ID).is_ok());
        assert!(store.server_repository("missing").is_err());
    }

    #[test]
    fn deleting_workspace_drops_repository() {
        let store = MemoryWorkspaceStore::new();
        store.create(&Workspace::local("ws-1", "One")).unwrap();
        assert!(store.create(&Workspace::local("ws-1", "Again")).is_err());

        store.delete("ws-1").unwrap();
        assert!(store.repository("ws-1").is_none());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_manager_failures() {
        let manager = MemoryServerManager::with_servers(vec![server("a")]);
        manager.fail_add("b");

        assert!(manager.add_server(server("b")).await.is_err());
        assert!(manager.add_server(server("a")).await.is_err());
        assert!(manager.remove_server("zzz").await.is_err());

        manager.remove_server("a").await.unwrap();
        assert!(manager.servers().is_empty());
    }

    #[tokio::test]
    async fn server_manager_writes_through_to_repository() {
        let store = MemoryWorkspaceStore::new();
        let repo = store.repository(DEFAULT_WORKSPACE_ID).unwrap();
        repo.set_servers(vec![server("a")]);
        let manager = MemoryServerManager::new(repo.clone());

        manager.add_server(server("b")).await.unwrap();
        manager.remove_server("a").await.unwrap();

        assert_eq!(repo.servers(), vec![server("b")]);
        assert_eq!(
            store
                .server_repository(DEFAULT_WORKSPACE_ID)
                .unwrap()
                .get_all_servers()
                .unwrap(),
            vec![server("b")]
        );
    }
}
