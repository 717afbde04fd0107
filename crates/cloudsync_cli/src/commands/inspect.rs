//! Inspect command implementation.

use super::read_envelope;
use serde::Serialize;
use std::path::Path;

/// Envelope inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Envelope path.
    pub path: String,
    /// Envelope schema version.
    pub schema_version: u32,
    /// Key derivation function.
    pub kdf: String,
    /// Encryption timestamp.
    pub updated_at: Option<String>,
    /// Nonce length in bytes.
    pub nonce_len: usize,
    /// Salt length in bytes.
    pub salt_len: usize,
    /// Ciphertext length in bytes, tag included.
    pub ciphertext_len: usize,
}

/// Reads and validates an envelope without decrypting it.
pub fn inspect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let envelope = read_envelope(path)?;
    let decoded = envelope.decode()?;

    Ok(InspectResult {
        path: path.display().to_string(),
        schema_version: decoded.schema_version,
        kdf: envelope.kdf,
        updated_at: decoded.updated_at,
        nonce_len: decoded.nonce.len(),
        salt_len: decoded.salt.len(),
        ciphertext_len: decoded.ciphertext.len(),
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("CloudSync Envelope: {}", result.path);
    println!();
    println!("Schema version: {}", result.schema_version);
    println!("KDF:            {}", result.kdf);
    println!(
        "Updated at:     {}",
        result.updated_at.as_deref().unwrap_or("(missing)")
    );
    println!();
    println!("Nonce:      {} bytes", result.nonce_len);
    println!("Salt:       {} bytes", result.salt_len);
    println!("Ciphertext: {} bytes (including tag)", result.ciphertext_len);
}
