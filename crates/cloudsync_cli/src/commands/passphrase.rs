//! Passphrase input.

use zeroize::Zeroizing;

/// Environment variable consulted before prompting.
pub const PASSPHRASE_ENV: &str = "CLOUDSYNC_PASSPHRASE";

/// Reads the passphrase from the environment or an interactive prompt.
pub fn read() -> Result<Zeroizing<String>, Box<dyn std::error::Error>> {
    if let Ok(value) = std::env::var(PASSPHRASE_ENV) {
        if !value.is_empty() {
            tracing::debug!("using passphrase from {}", PASSPHRASE_ENV);
            return Ok(Zeroizing::new(value));
        }
    }

    let value = Zeroizing::new(rpassword::prompt_password("Passphrase: ")?);
    if value.is_empty() {
        return Err("Passphrase must not be empty".into());
    }
    Ok(value)
}
