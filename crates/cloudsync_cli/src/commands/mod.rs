//! CLI command implementations.

pub mod decrypt;
pub mod encrypt;
pub mod inspect;
pub mod passphrase;
pub mod verify;

use cloudsync_protocol::Envelope;
use std::path::Path;

/// Reads an envelope JSON file.
pub fn read_envelope(path: &Path) -> Result<Envelope, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Ok(Envelope::from_json(&json)?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};
    use cloudsync_protocol::{McpServerConfig, WorkspaceBundle, WorkspaceBundleEntry};
    use std::path::{Path, PathBuf};

    pub const PASSPHRASE: &str = "correct horse";

    pub fn bundle() -> WorkspaceBundle {
        WorkspaceBundle::new(vec![
            WorkspaceBundleEntry::local(
                "local-default",
                "Default",
                vec![
                    McpServerConfig::local("s1", "Files", "npx"),
                    McpServerConfig::remote("s2", "Search", "https://mcp.example.com"),
                ],
            ),
            WorkspaceBundleEntry::remote("ws-team", "Team", "https://team.example.com"),
        ])
    }

    /// Seals [`bundle`] into `dir/envelope.json`.
    pub fn write_envelope(dir: &Path) -> PathBuf {
        let json = bundle().to_json().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let envelope = cloudsync_crypto::seal(PASSPHRASE, json.as_bytes(), ts).unwrap();

        let path = dir.join("envelope.json");
        std::fs::write(&path, envelope.to_json().unwrap()).unwrap();
        path
    }
}
