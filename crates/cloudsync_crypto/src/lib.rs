//! # CloudSync Crypto
//!
//! Passphrase-based encryption of workspace bundles.
//!
//! ## Security Model
//!
//! - Keys are derived with Argon2id (64 MiB, 3 passes, 1 lane) from the
//!   user passphrase and a per-envelope random salt
//! - Bundles are sealed with AES-256-GCM under a per-envelope random nonce
//! - A failed tag check never distinguishes a wrong passphrase from
//!   tampered data
//! - Keys are zeroized on drop
//!
//! ## Usage
//!
//! ```ignore
//! use cloudsync_crypto::{open, seal};
//!
//! let envelope = seal("correct horse", bundle_json.as_bytes(), chrono::Utc::now())?;
//! let plaintext = open("correct horse", &envelope)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cipher;
mod error;
mod kdf;
mod sealed;

pub use cipher::{decrypt, encrypt};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{
    derive_key, EncryptionKey, KDF_MEMORY_COST_KIB, KDF_OUTPUT_LEN, KDF_PARALLELISM, KDF_TIME_COST,
    KEY_SIZE,
};
pub use sealed::{open, seal, seal_with};
