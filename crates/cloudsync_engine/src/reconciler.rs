//! Applying a workspace bundle to local storage, and exporting one.
//!
//! Pulling replaces local state wholesale: workspaces missing from the
//! bundle are deleted and every local workspace's server list is replaced.
//! The default workspace is never deleted and never becomes remote.

use crate::error::{SyncError, SyncResult};
use crate::services::{
    RemoteConfig, ServerManager, ServerTransaction, Workspace, WorkspaceStore, WorkspaceType,
    WorkspaceUpdate,
};
use cloudsync_protocol::{
    McpServerConfig, WorkspaceBundle, WorkspaceBundleEntry, WorkspaceContent,
    DEFAULT_WORKSPACE_ID,
};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Reconciles storage with a bundle.
///
/// The server manager is only needed when the bundle touches the active
/// workspace; without one that path fails with [`SyncError::NotInitialized`].
pub struct Reconciler<'a> {
    store: &'a dyn WorkspaceStore,
    server_manager: Option<&'a dyn ServerManager>,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler over the given collaborators.
    pub fn new(store: &'a dyn WorkspaceStore, server_manager: Option<&'a dyn ServerManager>) -> Self {
        Self {
            store,
            server_manager,
        }
    }

    /// Applies a bundle: upsert, delete missing, then replace servers of
    /// every local entry.
    pub async fn apply_bundle(&self, bundle: &WorkspaceBundle) -> SyncResult<()> {
        self.upsert_workspaces(&bundle.workspaces)?;
        self.delete_missing_workspaces(&bundle.workspaces)?;

        let active = self.store.active_workspace_id()?;
        for entry in bundle.workspaces.iter().filter(|e| e.is_local()) {
            self.replace_workspace_servers(entry, active.as_deref())
                .await?;
        }

        info!(
            workspaces = bundle.workspaces.len(),
            servers = bundle.server_count(),
            "applied workspace bundle"
        );
        Ok(())
    }

    /// Creates missing workspaces and updates changed ones.
    pub fn upsert_workspaces(&self, entries: &[WorkspaceBundleEntry]) -> SyncResult<()> {
        for entry in entries {
            let workspace_type = if entry.id == DEFAULT_WORKSPACE_ID || entry.is_local() {
                WorkspaceType::Local
            } else {
                WorkspaceType::Remote
            };
            let existing = self.store.find_by_id(&entry.id)?;

            let remote_config = match workspace_type {
                WorkspaceType::Local => None,
                WorkspaceType::Remote => {
                    let from_bundle = match &entry.content {
                        WorkspaceContent::Remote { api_url } => api_url.clone(),
                        WorkspaceContent::Local { .. } => None,
                    };
                    let api_url = from_bundle
                        .or_else(|| {
                            existing
                                .as_ref()
                                .and_then(|w| w.remote_config.as_ref())
                                .map(|rc| rc.api_url.clone())
                        })
                        .unwrap_or_default();
                    Some(RemoteConfig::new(api_url))
                }
            };

            let Some(existing) = existing else {
                debug!(workspace = %entry.id, "creating workspace from bundle");
                self.store.create(&Workspace {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    workspace_type,
                    remote_config,
                })?;
                continue;
            };

            let remote_config_changed = match workspace_type {
                WorkspaceType::Remote => {
                    api_url_of(existing.remote_config.as_ref()) != api_url_of(remote_config.as_ref())
                }
                WorkspaceType::Local => existing.remote_config.is_some(),
            };

            if existing.name != entry.name
                || existing.workspace_type != workspace_type
                || remote_config_changed
            {
                debug!(workspace = %entry.id, "updating workspace from bundle");
                self.store.update(
                    &entry.id,
                    &WorkspaceUpdate {
                        name: entry.name.clone(),
                        workspace_type,
                        remote_config,
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Deletes stored workspaces that the bundle does not mention.
    pub fn delete_missing_workspaces(&self, entries: &[WorkspaceBundleEntry]) -> SyncResult<()> {
        let incoming: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();

        for workspace in self.store.list()? {
            if workspace.id == DEFAULT_WORKSPACE_ID || incoming.contains(workspace.id.as_str()) {
                continue;
            }
            debug!(workspace = %workspace.id, "deleting workspace missing from bundle");
            self.store.delete(&workspace.id)?;
        }
        Ok(())
    }

    /// Replaces the servers of one local workspace.
    ///
    /// The active workspace goes through the server manager with a
    /// best-effort rollback; any other workspace is rewritten inside a
    /// repository transaction.
    pub async fn replace_workspace_servers(
        &self,
        entry: &WorkspaceBundleEntry,
        active_workspace_id: Option<&str>,
    ) -> SyncResult<()> {
        let incoming = entry.servers();

        if active_workspace_id == Some(entry.id.as_str()) {
            let manager = self.server_manager.ok_or(SyncError::NotInitialized)?;
            return replace_active_servers(manager, incoming).await;
        }

        let repository = self.store.server_repository(&entry.id)?;
        repository.transaction(&mut |tx: &mut dyn ServerTransaction| {
            tx.delete_all()?;
            for server in incoming {
                tx.add_server(server)?;
            }
            Ok(())
        })
    }

    /// Builds a bundle from everything in storage.
    pub fn export_bundle(&self) -> SyncResult<WorkspaceBundle> {
        let mut entries = Vec::new();

        for workspace in self.store.list()? {
            let entry = match workspace.workspace_type {
                WorkspaceType::Remote => {
                    let api_url = api_url_of(workspace.remote_config.as_ref());
                    WorkspaceBundleEntry::remote(workspace.id, workspace.name, api_url)
                }
                WorkspaceType::Local => {
                    let servers = self
                        .store
                        .server_repository(&workspace.id)?
                        .get_all_servers()?;
                    WorkspaceBundleEntry::local(workspace.id, workspace.name, servers)
                }
            };
            entries.push(entry);
        }

        Ok(WorkspaceBundle::new(entries))
    }
}

fn api_url_of(config: Option<&RemoteConfig>) -> &str {
    config.map(|rc| rc.api_url.as_str()).unwrap_or("")
}

/// Progress of a live server swap, kept for rollback.
#[derive(Default)]
struct SwapProgress {
    removed: Vec<String>,
    added: Vec<String>,
}

async fn swap_servers(
    manager: &dyn ServerManager,
    current: &[McpServerConfig],
    incoming: &[McpServerConfig],
    progress: &mut SwapProgress,
) -> SyncResult<()> {
    for server in current {
        manager.remove_server(&server.id).await?;
        progress.removed.push(server.id.clone());
    }
    for server in incoming {
        manager.add_server(server.clone()).await?;
        progress.added.push(server.id.clone());
    }
    Ok(())
}

async fn replace_active_servers(
    manager: &dyn ServerManager,
    incoming: &[McpServerConfig],
) -> SyncResult<()> {
    let snapshot = manager.get_servers().await?;
    let mut progress = SwapProgress::default();

    let Err(err) = swap_servers(manager, &snapshot, incoming, &mut progress).await else {
        return Ok(());
    };

    warn!(error = %err, "failed to replace active servers, rolling back");

    for id in progress.added.iter().rev() {
        if let Err(e) = manager.remove_server(id).await {
            error!(server = %id, error = %e, "rollback failed to remove server");
        }
    }
    for server in snapshot.iter().filter(|s| progress.removed.contains(&s.id)) {
        if let Err(e) = manager.add_server(server.clone()).await {
            error!(server = %server.id, error = %e, "rollback failed to restore server");
        }
    }

    Err(err)
}
