//! Decrypt command implementation.

use super::read_envelope;
use cloudsync_protocol::WorkspaceBundle;
use std::path::Path;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Decrypts an envelope and returns the bundle JSON as stored.
pub fn decrypt(path: &Path, passphrase: &str) -> Result<Zeroizing<String>, Box<dyn std::error::Error>> {
    let envelope = read_envelope(path)?;
    let plaintext = cloudsync_crypto::open(passphrase, &envelope)?;
    let json = Zeroizing::new(String::from_utf8(plaintext.to_vec())?);

    if let Err(e) = WorkspaceBundle::parse(&json) {
        warn!("Decrypted payload is not a valid bundle: {}", e);
    }

    Ok(json)
}

/// Runs the decrypt command.
pub fn run(
    path: &Path,
    passphrase: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = decrypt(path, passphrase)?;

    match output {
        Some(output) => {
            std::fs::write(output, json.as_bytes())
                .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;
            info!("Wrote bundle to {:?}", output);
        }
        None => println!("{}", json.as_str()),
    }

    Ok(())
}
