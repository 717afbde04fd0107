//! AES-256-GCM with the tag appended to the ciphertext.

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::EncryptionKey;
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use cloudsync_protocol::{NONCE_SIZE, TAG_SIZE};

fn cipher_for(key: &EncryptionKey) -> Aes256Gcm {
    Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()))
}

/// Encrypts `plaintext`, returning `ciphertext || tag`.
pub fn encrypt(
    key: &EncryptionKey,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    cipher_for(key)
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)
}

/// Verifies and decrypts `ciphertext || tag`.
///
/// # Errors
///
/// Returns [`CryptoError::AuthenticationFailed`] if the data is too short to
/// hold a tag or the tag does not verify. Plaintext is only returned after
/// successful verification.
pub fn decrypt(
    key: &EncryptionKey,
    nonce: &[u8; NONCE_SIZE],
    ciphertext_with_tag: &[u8],
) -> CryptoResult<Vec<u8>> {
    if ciphertext_with_tag.len() <= TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    cipher_for(key)
        .decrypt(Nonce::from_slice(nonce), ciphertext_with_tag)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::KEY_SIZE;
    use proptest::prelude::*;

    fn key(byte: u8) -> EncryptionKey {
        EncryptionKey::from_bytes([byte; KEY_SIZE])
    }

    const NONCE: [u8; NONCE_SIZE] = [3u8; NONCE_SIZE];

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let plaintext = br#"{"workspaces": []}"#;
        let sealed = encrypt(&key(1), &NONCE, plaintext).unwrap();

        assert_eq!(sealed.len(), plaintext.len() + TAG_SIZE);
        assert_ne!(&sealed[..plaintext.len()], plaintext);
        assert_eq!(decrypt(&key(1), &NONCE, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = encrypt(&key(1), &NONCE, b"secret").unwrap();
        assert_eq!(
            decrypt(&key(2), &NONCE, &sealed).unwrap_err(),
            CryptoError::AuthenticationFailed
        );
    }

    #[test]
    fn wrong_nonce_fails_authentication() {
        let sealed = encrypt(&key(1), &NONCE, b"secret").unwrap();
        assert!(decrypt(&key(1), &[4u8; NONCE_SIZE], &sealed).is_err());
    }

    #[test]
    fn tag_only_input_is_rejected() {
        assert_eq!(
            decrypt(&key(1), &NONCE, &[0u8; TAG_SIZE]).unwrap_err(),
            CryptoError::AuthenticationFailed
        );
    }

    #[test]
    fn truncated_tag_fails() {
        let sealed = encrypt(&key(1), &NONCE, b"some bundle").unwrap();
        assert!(decrypt(&key(1), &NONCE, &sealed[..sealed.len() - 1]).is_err());
    }

    proptest! {
        #[test]
        fn any_bit_flip_is_detected(
            plaintext in proptest::collection::vec(any::<u8>(), 1..256),
            position in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut sealed = encrypt(&key(7), &NONCE, &plaintext).unwrap();
            let index = position.index(sealed.len());
            sealed[index] ^= 1 << bit;

            prop_assert_eq!(
                decrypt(&key(7), &NONCE, &sealed).unwrap_err(),
                CryptoError::AuthenticationFailed
            );
        }
    }
}
