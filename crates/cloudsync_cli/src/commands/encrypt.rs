//! Encrypt command implementation.

use chrono::Utc;
use cloudsync_protocol::WorkspaceBundle;
use std::path::Path;
use tracing::info;

/// Runs the encrypt command.
///
/// The bundle is validated before sealing so a broken file never reaches
/// the remote.
pub fn run(bundle_path: &Path, passphrase: &str, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(bundle_path)
        .map_err(|e| format!("Failed to read {}: {}", bundle_path.display(), e))?;
    let bundle = WorkspaceBundle::parse(&json)?;

    let envelope = cloudsync_crypto::seal(passphrase, json.as_bytes(), Utc::now())?;
    std::fs::write(output, envelope.to_json()?)
        .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;

    info!(
        "Sealed {} workspaces ({} servers) into {:?}",
        bundle.workspaces.len(),
        bundle.server_count(),
        output
    );
    Ok(())
}
