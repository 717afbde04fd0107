//! Persisted sync state and the public views derived from it.

use serde::{Deserialize, Serialize};

/// Subscription statuses that allow syncing.
const ENTITLED_STATUSES: [&str; 2] = ["active", "trialing"];

/// Cloud sync state persisted inside the application settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncState {
    /// Whether the user turned sync on.
    pub enabled: bool,
    /// `updatedAt` of the last envelope pulled or pushed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<String>,
    /// Message of the last failed attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Base64 of the secure-storage blob holding the passphrase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_passphrase: Option<String>,
}

impl std::fmt::Debug for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncState")
            .field("enabled", &self.enabled)
            .field("last_synced_at", &self.last_synced_at)
            .field("last_error", &self.last_error)
            .field(
                "encrypted_passphrase",
                &self.encrypted_passphrase.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// The slice of application settings the engine reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Sync state; absent until sync is first touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_sync: Option<SyncState>,
    /// Billing status as reported by the account service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<String>,
}

impl Settings {
    /// Returns the sync state, or defaults when none was stored.
    pub fn sync_state(&self) -> SyncState {
        self.cloud_sync.clone().unwrap_or_default()
    }

    /// True for `active` and `trialing` subscriptions.
    pub fn has_entitlement(&self) -> bool {
        self.subscription_status
            .as_deref()
            .is_some_and(|status| ENTITLED_STATUSES.contains(&status))
    }
}

/// Public view of the sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Whether sync is on.
    pub enabled: bool,
    /// Timestamp of the last successful sync.
    pub last_synced_at: Option<String>,
    /// Message of the last failed attempt.
    pub last_error: Option<String>,
    /// Whether a passphrase has been stored.
    pub has_passphrase: bool,
    /// Whether secure storage is usable.
    pub encryption_available: bool,
}

/// Current state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Enabled and waiting for the next trigger.
    Idle,
    /// A sync attempt is in flight.
    Syncing,
    /// Sync is turned off.
    Disabled,
}

/// Why a sync attempt did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Sync is turned off.
    Disabled,
    /// Another attempt holds the in-progress flag.
    AlreadySyncing,
    /// A precondition failed; the message was recorded as `lastError`.
    PreconditionNotMet(String),
}

/// Result of one call to [`crate::SyncEngine::sync_now`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The remote bundle was newer and has been applied locally.
    Pulled {
        /// `updatedAt` of the applied envelope.
        updated_at: String,
    },
    /// The local bundle was uploaded.
    Pushed {
        /// `updatedAt` acknowledged by the server.
        updated_at: String,
    },
    /// Nothing was attempted.
    Skipped(SkipReason),
    /// The attempt failed; the message was recorded as `lastError`.
    Failed {
        /// Error message.
        error: String,
    },
}

impl SyncOutcome {
    /// Returns true for pulls and pushes.
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Pulled { .. } | SyncOutcome::Pushed { .. })
    }
}
