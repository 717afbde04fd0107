//! Local storage of the sync passphrase.
//!
//! The passphrase is encrypted with the platform's secure storage and kept
//! as base64 in [`SyncState::encrypted_passphrase`]. It never leaves this
//! machine.

use crate::error::{SyncError, SyncResult};
use crate::services::SecureStorage;
use crate::state::SyncState;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use tracing::warn;
use zeroize::Zeroizing;

/// Seals and reveals the passphrase through [`SecureStorage`].
#[derive(Clone)]
pub struct PassphraseVault {
    storage: Arc<dyn SecureStorage>,
}

impl PassphraseVault {
    /// Creates a vault over the given secure storage.
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Returns true if secure storage can be used.
    pub fn is_available(&self) -> bool {
        self.storage.is_encryption_available()
    }

    /// Encrypts the passphrase and returns the base64 blob to persist.
    pub fn seal_passphrase(&self, passphrase: &str) -> SyncResult<String> {
        if !self.is_available() {
            return Err(SyncError::SecureStorageUnavailable);
        }
        let blob = self.storage.encrypt_string(passphrase)?;
        Ok(STANDARD.encode(blob))
    }

    /// Recovers the stored passphrase.
    ///
    /// Returns `None` when secure storage is unavailable, nothing is stored
    /// or the stored blob cannot be decrypted.
    pub fn reveal(&self, state: &SyncState) -> Option<Zeroizing<String>> {
        if !self.is_available() {
            return None;
        }
        let encoded = state.encrypted_passphrase.as_deref()?;

        let blob = match STANDARD.decode(encoded) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "stored passphrase is not valid base64");
                return None;
            }
        };

        match self.storage.decrypt_string(&blob) {
            Ok(passphrase) => Some(Zeroizing::new(passphrase)),
            Err(e) => {
                warn!(error = %e, "failed to decrypt stored passphrase");
                None
            }
        }
    }

    /// Returns true if a passphrase blob is stored.
    pub fn has_passphrase(state: &SyncState) -> bool {
        state
            .encrypted_passphrase
            .as_deref()
            .is_some_and(|blob| !blob.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySecureStorage;

    fn vault() -> (Arc<MemorySecureStorage>, PassphraseVault) {
        let storage = Arc::new(MemorySecureStorage::new());
        (storage.clone(), PassphraseVault::new(storage))
    }

    #[test]
    fn seal_and_reveal() {
        let (_, vault) = vault();
        let sealed = vault.seal_passphrase("correct horse").unwrap();
        assert_ne!(sealed, "correct horse");

        let state = SyncState {
            encrypted_passphrase: Some(sealed),
            ..Default::default()
        };
        assert!(PassphraseVault::has_passphrase(&state));
        assert_eq!(vault.reveal(&state).unwrap().as_str(), "correct horse");
    }

    #[test]
    fn unavailable_storage() {
        let (storage, vault) = vault();
        let sealed = vault.seal_passphrase("pw").unwrap();

        storage.set_available(false);
        assert_eq!(
            vault.seal_passphrase("pw").unwrap_err(),
            SyncError::SecureStorageUnavailable
        );

        let state = SyncState {
            encrypted_passphrase: Some(sealed),
            ..Default::default()
        };
        assert!(vault.reveal(&state).is_none());
    }

    #[test]
    fn unreadable_blob_reveals_nothing() {
        let (_, vault) = vault();
        let mut state = SyncState::default();
        assert!(vault.reveal(&state).is_none());
        assert!(!PassphraseVault::has_passphrase(&state));

        state.encrypted_passphrase = Some("***not base64***".into());
        assert!(vault.reveal(&state).is_none());

        state.encrypted_passphrase = Some(STANDARD.encode(b"not sealed by this storage"));
        assert!(vault.reveal(&state).is_none());
    }
}
