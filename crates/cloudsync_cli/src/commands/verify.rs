//! Verify command implementation.

use super::read_envelope;
use cloudsync_protocol::WorkspaceBundle;
use std::path::Path;
use tracing::info;

/// Summary of a successfully decrypted envelope.
#[derive(Debug, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of workspaces.
    pub workspaces: usize,
    /// Number of local workspaces.
    pub local_workspaces: usize,
    /// Number of servers across all local workspaces.
    pub servers: usize,
}

/// Decrypts the envelope and parses the bundle inside.
pub fn verify(path: &Path, passphrase: &str) -> Result<VerifyReport, Box<dyn std::error::Error>> {
    let envelope = read_envelope(path)?;
    let plaintext = cloudsync_crypto::open(passphrase, &envelope)?;
    let bundle = WorkspaceBundle::parse(std::str::from_utf8(&plaintext)?)?;

    Ok(VerifyReport {
        workspaces: bundle.workspaces.len(),
        local_workspaces: bundle.workspaces.iter().filter(|e| e.is_local()).count(),
        servers: bundle.server_count(),
    })
}

/// Runs the verify command.
pub fn run(path: &Path, passphrase: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("Verifying envelope at {:?}", path);

    let report = verify(path, passphrase)?;

    println!("Envelope OK");
    println!(
        "  Workspaces: {} ({} local, {} remote)",
        report.workspaces,
        report.local_workspaces,
        report.workspaces - report.local_workspaces
    );
    println!("  Servers:    {}", report.servers);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures;
    use tempfile::tempdir;

    #[test]
    fn verify_counts_bundle_contents() {
        let dir = tempdir().unwrap();
        let path = fixtures::write_envelope(dir.path());

        assert_eq!(
            verify(&path, fixtures::PASSPHRASE).unwrap(),
            VerifyReport {
                workspaces: 2,
                local_workspaces: 1,
                servers: 2,
            }
        );
    }

    #[test]
    fn verify_fails_with_wrong_passphrase() {
        let dir = tempdir().unwrap();
        let path = fixtures::write_envelope(dir.path());

        let err = verify(&path, "battery staple").unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
    }
}
