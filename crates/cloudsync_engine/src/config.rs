//! Configuration for the sync engine.

use std::time::Duration;

/// Path of the encrypted blob on the sync server.
pub const BLOB_PATH: &str = "/vault/servers/blob";

/// Default period between background syncs (10 minutes).
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(600_000);

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the sync server, without trailing slash.
    pub base_url: String,
    /// Period of the background poller.
    pub polling_interval: Duration,
    /// Request timeout for HTTP clients.
    pub request_timeout: Duration,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the polling interval.
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Full URL of the blob endpoint.
    pub fn blob_url(&self) -> String {
        format!("{}{}", self.base_url, BLOB_PATH)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://sync.example.com/")
            .with_polling_interval(Duration::from_secs(5))
            .with_request_timeout(Duration::from_secs(60));

        assert_eq!(config.base_url, "https://sync.example.com");
        assert_eq!(config.polling_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(
            config.blob_url(),
            "https://sync.example.com/vault/servers/blob"
        );
    }

    #[test]
    fn default_polls_every_ten_minutes() {
        let config = SyncConfig::default();
        assert_eq!(config.polling_interval, Duration::from_secs(600));
        assert_eq!(config.blob_url(), "/vault/servers/blob");
    }
}
