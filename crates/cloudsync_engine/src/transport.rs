//! Transport layer abstraction for the blob endpoint.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use cloudsync_protocol::Envelope;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Reads and writes the single encrypted blob stored for an account.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, mock for testing, etc.).
#[async_trait]
pub trait BlobTransport: Send + Sync {
    /// Fetches the stored envelope, or `None` if the account has none.
    async fn get_blob(&self, token: &str) -> SyncResult<Option<Envelope>>;

    /// Uploads an envelope and returns the one the server acknowledged.
    async fn put_blob(&self, token: &str, envelope: &Envelope) -> SyncResult<Envelope>;
}

/// An in-memory blob server for testing.
///
/// Stores whatever is put and hands it back on get. Requests are counted
/// so tests can assert that preconditions short-circuit before the network.
#[derive(Debug, Default)]
pub struct MockTransport {
    blob: Mutex<Option<Envelope>>,
    failure: Mutex<Option<SyncError>>,
    expected_token: Mutex<Option<String>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MockTransport {
    /// Creates an empty mock server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored envelope.
    pub fn set_blob(&self, envelope: Option<Envelope>) {
        *self.blob.lock() = envelope;
    }

    /// Returns the stored envelope.
    pub fn blob(&self) -> Option<Envelope> {
        self.blob.lock().clone()
    }

    /// Makes every request fail with `error` until cleared with `None`.
    pub fn set_failure(&self, error: Option<SyncError>) {
        *self.failure.lock() = error;
    }

    /// Rejects requests whose token differs with a 401.
    pub fn require_token(&self, token: impl Into<String>) {
        *self.expected_token.lock() = Some(token.into());
    }

    /// Number of GET requests received.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of PUT requests received.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn check(&self, token: &str) -> SyncResult<()> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        match self.expected_token.lock().as_deref() {
            Some(expected) if expected != token => {
                Err(SyncError::http_status(401, "Unauthorized"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl BlobTransport for MockTransport {
    async fn get_blob(&self, token: &str) -> SyncResult<Option<Envelope>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check(token)?;
        Ok(self.blob.lock().clone())
    }

    async fn put_blob(&self, token: &str, envelope: &Envelope) -> SyncResult<Envelope> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check(token)?;
        *self.blob.lock() = Some(envelope.clone());
        Ok(envelope.clone())
    }
}
