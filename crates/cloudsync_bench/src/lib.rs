//! Benchmark utilities.

use cloudsync_protocol::{McpServerConfig, WorkspaceBundle, WorkspaceBundleEntry, DEFAULT_WORKSPACE_ID};
use rand::Rng;

/// Generate random plaintext of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a server with a few args and env entries.
pub fn server(index: usize) -> McpServerConfig {
    McpServerConfig::local(
        format!("server-{}", index),
        format!("Server {}", index),
        "npx",
    )
    .with_args(["-y", "@modelcontextprotocol/server-filesystem", "/tmp"])
    .with_env("LOG_LEVEL", "info")
    .with_env("API_KEY", format!("key-{:08x}", index))
}

/// Generate a bundle with `workspaces` local workspaces of
/// `servers_per_workspace` servers each, plus one remote workspace.
pub fn generate_bundle(workspaces: usize, servers_per_workspace: usize) -> WorkspaceBundle {
    let mut entries: Vec<_> = (0..workspaces)
        .map(|w| {
            let id = if w == 0 {
                DEFAULT_WORKSPACE_ID.to_string()
            } else {
                format!("ws-{}", w)
            };
            let servers = (0..servers_per_workspace)
                .map(|s| server(w * servers_per_workspace + s))
                .collect();
            WorkspaceBundleEntry::local(id, format!("Workspace {}", w), servers)
        })
        .collect();
    entries.push(WorkspaceBundleEntry::remote(
        "ws-remote",
        "Remote",
        "https://api.example.com",
    ));
    WorkspaceBundle::new(entries)
}
