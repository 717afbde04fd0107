//! The sync orchestrator.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::reconciler::Reconciler;
use crate::services::{AuthProvider, SecureStorage, ServerManager, SettingsStore, WorkspaceStore};
use crate::state::{EngineState, SkipReason, SyncOutcome, SyncState, SyncStatus};
use crate::transport::BlobTransport;
use crate::vault::PassphraseVault;
use chrono::Utc;
use cloudsync_protocol::{parse_timestamp_millis, Envelope, WorkspaceBundle};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

const AUTHENTICATION_REQUIRED: &str = "Authentication required";
const SUBSCRIPTION_REQUIRED: &str = "Pro subscription required";
const PASSPHRASE_NOT_SET: &str = "Passphrase is not set";

/// Collaborators handed to [`SyncEngine::new`].
pub struct SyncServices {
    /// Blob endpoint.
    pub transport: Arc<dyn BlobTransport>,
    /// Application settings.
    pub settings: Arc<dyn SettingsStore>,
    /// OS secret storage for the passphrase.
    pub secure_storage: Arc<dyn SecureStorage>,
    /// Bearer token source.
    pub auth: Arc<dyn AuthProvider>,
    /// Workspace and server storage.
    pub workspaces: Arc<dyn WorkspaceStore>,
}

/// Clears the in-progress flag when dropped.
struct InProgress<'a>(&'a AtomicBool);

impl<'a> InProgress<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The cloud sync engine.
///
/// Decides per attempt whether to pull or push, keeps the persisted
/// [`SyncState`] current and drives a background poller. Construction is
/// two-phase: [`SyncEngine::new`] wires storage, [`SyncEngine::start`]
/// supplies the live server manager once the host has one.
///
/// The engine is always used through an `Arc`; background work holds a
/// clone or a weak reference.
pub struct SyncEngine {
    config: SyncConfig,
    transport: Arc<dyn BlobTransport>,
    settings: Arc<dyn SettingsStore>,
    auth: Arc<dyn AuthProvider>,
    workspaces: Arc<dyn WorkspaceStore>,
    vault: PassphraseVault,
    server_manager: RwLock<Option<Arc<dyn ServerManager>>>,
    in_progress: AtomicBool,
    state_lock: Mutex<()>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Creates a new engine.
    pub fn new(config: SyncConfig, services: SyncServices) -> Arc<Self> {
        Arc::new(Self {
            config,
            transport: services.transport,
            settings: services.settings,
            auth: services.auth,
            workspaces: services.workspaces,
            vault: PassphraseVault::new(services.secure_storage),
            server_manager: RwLock::new(None),
            in_progress: AtomicBool::new(false),
            state_lock: Mutex::new(()),
            poller: Mutex::new(None),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Supplies the server manager and resumes polling if sync was left on.
    ///
    /// Polling resumes only when sync is enabled, a passphrase is stored
    /// and the subscription is `active` or `trialing`. Must be called from
    /// within a Tokio runtime.
    pub fn start(self: &Arc<Self>, server_manager: Arc<dyn ServerManager>) -> SyncResult<()> {
        *self.server_manager.write() = Some(server_manager);

        let settings = self.settings.load()?;
        let state = settings.sync_state();
        if state.enabled && PassphraseVault::has_passphrase(&state) && settings.has_entitlement() {
            self.start_polling();
        }
        Ok(())
    }

    /// Stops the poller. An in-flight sync runs to completion.
    pub fn stop(&self) {
        self.stop_polling();
    }

    /// Returns the public sync status.
    pub fn status(&self) -> SyncResult<SyncStatus> {
        let state = self.settings.load()?.sync_state();
        Ok(self.status_from(&state))
    }

    fn status_from(&self, state: &SyncState) -> SyncStatus {
        SyncStatus {
            enabled: state.enabled,
            last_synced_at: state.last_synced_at.clone(),
            last_error: state.last_error.clone(),
            has_passphrase: PassphraseVault::has_passphrase(state),
            encryption_available: self.vault.is_available(),
        }
    }

    /// Returns the current engine state.
    pub fn state(&self) -> EngineState {
        if self.in_progress.load(Ordering::Acquire) {
            return EngineState::Syncing;
        }
        match self.settings.load() {
            Ok(settings) if settings.sync_state().enabled => EngineState::Idle,
            _ => EngineState::Disabled,
        }
    }

    /// Returns true while the background poller is running.
    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Turns sync on or off.
    ///
    /// Enabling clears `lastError`, starts the poller and fires one sync in
    /// the background. Disabling stops the poller. Must be called from
    /// within a Tokio runtime.
    pub fn set_enabled(self: &Arc<Self>, enabled: bool) -> SyncResult<SyncStatus> {
        let state = self.update_sync_state(|state| {
            state.enabled = enabled;
            state.last_error = None;
        })?;
        info!(enabled, "cloud sync toggled");

        if enabled {
            self.start_polling();
            self.spawn_sync();
        } else {
            self.stop_polling();
        }

        Ok(self.status_from(&state))
    }

    /// Stores a new passphrase.
    ///
    /// If the account already has a remote blob the passphrase must
    /// decrypt it; otherwise nothing is stored and the decryption error is
    /// returned. When sync is enabled a background sync follows, so this
    /// must be called from within a Tokio runtime.
    pub async fn set_passphrase(self: &Arc<Self>, passphrase: &str) -> SyncResult<()> {
        if !self.vault.is_available() {
            return Err(SyncError::SecureStorageUnavailable);
        }
        if passphrase.is_empty() {
            return Err(SyncError::InvalidPassphrase(
                "passphrase must not be empty".into(),
            ));
        }

        if let Some(token) = self.auth.auth_token().await {
            if let Some(remote) = self.transport.get_blob(&token).await? {
                open_envelope(Zeroizing::new(passphrase.to_string()), remote).await?;
                debug!("passphrase verified against remote blob");
            }
        }

        let sealed = self.vault.seal_passphrase(passphrase)?;
        let state = self.update_sync_state(move |state| {
            state.encrypted_passphrase = Some(sealed);
            state.last_error = None;
        })?;
        info!("sync passphrase updated");

        if state.enabled {
            self.spawn_sync();
        }
        Ok(())
    }

    /// Runs one sync attempt.
    ///
    /// Never fails: errors are recorded as `lastError` and reported as
    /// [`SyncOutcome::Failed`].
    pub async fn sync_now(&self) -> SyncOutcome {
        let state = match self.settings.load() {
            Ok(settings) => settings.sync_state(),
            Err(err) => return self.record_failure(err),
        };
        if !state.enabled {
            debug!("sync skipped: disabled");
            return SyncOutcome::Skipped(SkipReason::Disabled);
        }

        let Some(_guard) = InProgress::acquire(&self.in_progress) else {
            debug!("sync skipped: already in progress");
            return SyncOutcome::Skipped(SkipReason::AlreadySyncing);
        };

        match self.attempt(&state).await {
            Ok(outcome) => outcome,
            Err(err) => self.record_failure(err),
        }
    }

    async fn attempt(&self, state: &SyncState) -> SyncResult<SyncOutcome> {
        let Some(token) = self.auth.auth_token().await else {
            return self.precondition_failed(AUTHENTICATION_REQUIRED);
        };
        if !self.settings.load()?.has_entitlement() {
            return self.precondition_failed(SUBSCRIPTION_REQUIRED);
        }
        let Some(passphrase) = self.vault.reveal(state) else {
            return self.precondition_failed(PASSPHRASE_NOT_SET);
        };

        let remote = self.transport.get_blob(&token).await?;
        let remote_millis = remote.as_ref().map_or(0, Envelope::updated_at_millis);
        let local_millis = state
            .last_synced_at
            .as_deref()
            .and_then(parse_timestamp_millis)
            .unwrap_or(0);

        match remote {
            Some(envelope) if remote_millis > local_millis => self.pull(envelope, passphrase).await,
            _ => self.push(&token, passphrase).await,
        }
    }

    async fn pull(&self, envelope: Envelope, passphrase: Zeroizing<String>) -> SyncResult<SyncOutcome> {
        let updated_at = envelope.updated_at.clone().unwrap_or_default();
        let plaintext = open_envelope(passphrase, envelope).await?;
        let json = std::str::from_utf8(&plaintext)
            .map_err(|e| SyncError::MalformedBundle(format!("bundle is not UTF-8: {}", e)))?;
        let bundle = WorkspaceBundle::parse(json)?;

        let manager = self.server_manager.read().clone();
        Reconciler::new(self.workspaces.as_ref(), manager.as_deref())
            .apply_bundle(&bundle)
            .await?;

        let synced_at = updated_at.clone();
        self.update_sync_state(move |state| {
            state.last_synced_at = Some(synced_at);
            state.last_error = None;
        })?;
        info!(updated_at = %updated_at, "pulled remote bundle");

        Ok(SyncOutcome::Pulled { updated_at })
    }

    async fn push(&self, token: &str, passphrase: Zeroizing<String>) -> SyncResult<SyncOutcome> {
        let bundle = Reconciler::new(self.workspaces.as_ref(), None).export_bundle()?;
        let json = Zeroizing::new(bundle.to_json()?);

        let envelope = tokio::task::spawn_blocking(move || {
            cloudsync_crypto::seal(&passphrase, json.as_bytes(), Utc::now())
        })
        .await??;

        let ack = self.transport.put_blob(token, &envelope).await?;
        let updated_at = ack
            .updated_at
            .or(envelope.updated_at)
            .unwrap_or_default();

        let synced_at = updated_at.clone();
        self.update_sync_state(move |state| {
            state.last_synced_at = Some(synced_at);
            state.last_error = None;
        })?;
        info!(
            updated_at = %updated_at,
            workspaces = bundle.workspaces.len(),
            "pushed local bundle"
        );

        Ok(SyncOutcome::Pushed { updated_at })
    }

    fn precondition_failed(&self, message: &str) -> SyncResult<SyncOutcome> {
        debug!(reason = message, "sync precondition not met");
        let recorded = message.to_string();
        self.update_sync_state(move |state| state.last_error = Some(recorded))?;
        Ok(SyncOutcome::Skipped(SkipReason::PreconditionNotMet(
            message.to_string(),
        )))
    }

    fn record_failure(&self, err: SyncError) -> SyncOutcome {
        warn!(error = %err, retryable = err.is_retryable(), "cloud sync failed");
        let message = err.to_string();
        let recorded = message.clone();
        if let Err(e) = self.update_sync_state(move |state| state.last_error = Some(recorded)) {
            error!(error = %e, "failed to record sync error");
        }
        SyncOutcome::Failed { error: message }
    }

    /// Read-modify-write of the persisted sync state.
    fn update_sync_state(&self, apply: impl FnOnce(&mut SyncState)) -> SyncResult<SyncState> {
        let _lock = self.state_lock.lock();
        let mut settings = self.settings.load()?;
        let mut state = settings.sync_state();
        apply(&mut state);
        settings.cloud_sync = Some(state.clone());
        self.settings.save(&settings)?;
        Ok(state)
    }

    fn spawn_sync(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = engine.sync_now().await;
            debug!(?outcome, "background sync finished");
        });
    }

    fn start_polling(self: &Arc<Self>) {
        let mut poller = self.poller.lock();
        if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let period = self.config.polling_interval;
        *poller = Some(tokio::spawn(poll(Arc::downgrade(self), period)));
        debug!(interval_ms = period.as_millis() as u64, "polling started");
    }

    fn stop_polling(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
            debug!("polling stopped");
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.get_mut().take() {
            handle.abort();
        }
    }
}

async fn poll(engine: Weak<SyncEngine>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        // A separate task, so aborting the poller never cancels a sync.
        tokio::spawn(async move {
            engine.sync_now().await;
        });
    }
}

async fn open_envelope(
    passphrase: Zeroizing<String>,
    envelope: Envelope,
) -> SyncResult<Zeroizing<Vec<u8>>> {
    let plaintext =
        tokio::task::spawn_blocking(move || cloudsync_crypto::open(&passphrase, &envelope))
            .await??;
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        MemorySecureStorage, MemoryServerManager, MemorySettingsStore, MemoryWorkspaceStore,
        StaticAuthProvider,
    };
    use crate::state::Settings;
    use crate::transport::MockTransport;
    use std::time::Duration;

    struct Fixture {
        engine: Arc<SyncEngine>,
        settings: Arc<MemorySettingsStore>,
        transport: Arc<MockTransport>,
    }

    fn fixture(settings: Settings, auth: StaticAuthProvider) -> Fixture {
        let settings = Arc::new(MemorySettingsStore::with_settings(settings));
        let transport = Arc::new(MockTransport::new());
        let engine = SyncEngine::new(
            SyncConfig::new("https://sync.example.com")
                .with_polling_interval(Duration::from_secs(10)),
            SyncServices {
                transport: transport.clone(),
                settings: settings.clone(),
                secure_storage: Arc::new(MemorySecureStorage::new()),
                auth: Arc::new(auth),
                workspaces: Arc::new(MemoryWorkspaceStore::new()),
            },
        );
        Fixture {
            engine,
            settings,
            transport,
        }
    }

    fn enabled_settings(subscription: Option<&str>) -> Settings {
        Settings {
            cloud_sync: Some(SyncState {
                enabled: true,
                ..Default::default()
            }),
            subscription_status: subscription.map(str::to_string),
        }
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn disabled_engine_does_nothing() {
        let f = fixture(Settings::default(), StaticAuthProvider::signed_in("t"));
        assert_eq!(f.engine.state(), EngineState::Disabled);
        assert_eq!(
            f.engine.sync_now().await,
            SyncOutcome::Skipped(SkipReason::Disabled)
        );
        assert_eq!(f.settings.save_count(), 0);
        assert_eq!(f.transport.get_count(), 0);
    }

    #[tokio::test]
    async fn in_progress_flag_blocks_second_attempt() {
        let f = fixture(enabled_settings(Some("active")), StaticAuthProvider::signed_in("t"));
        let guard = InProgress::acquire(&f.engine.in_progress).unwrap();
        assert_eq!(f.engine.state(), EngineState::Syncing);
        assert_eq!(
            f.engine.sync_now().await,
            SyncOutcome::Skipped(SkipReason::AlreadySyncing)
        );

        drop(guard);
        assert_eq!(f.engine.state(), EngineState::Idle);
    }

    #[tokio::test]
    async fn preconditions_are_checked_in_order() {
        let f = fixture(enabled_settings(None), StaticAuthProvider::signed_out());
        assert_eq!(
            f.engine.sync_now().await,
            SyncOutcome::Skipped(SkipReason::PreconditionNotMet(
                AUTHENTICATION_REQUIRED.into()
            ))
        );

        let f = fixture(enabled_settings(Some("canceled")), StaticAuthProvider::signed_in("t"));
        f.engine.sync_now().await;
        assert_eq!(
            f.engine.status().unwrap().last_error.as_deref(),
            Some(SUBSCRIPTION_REQUIRED)
        );

        let f = fixture(enabled_settings(Some("trialing")), StaticAuthProvider::signed_in("t"));
        f.engine.sync_now().await;
        assert_eq!(
            f.engine.status().unwrap().last_error.as_deref(),
            Some(PASSPHRASE_NOT_SET)
        );
        assert_eq!(f.transport.get_count(), 0);
        assert!(!f.engine.in_progress.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn start_resumes_polling_only_when_ready() {
        let f = fixture(enabled_settings(Some("active")), StaticAuthProvider::signed_in("t"));
        f.engine
            .start(Arc::new(MemoryServerManager::default()))
            .unwrap();
        assert!(!f.engine.is_polling());

        f.engine.set_passphrase("correct horse").await.unwrap();
        f.engine.stop();
        f.engine
            .start(Arc::new(MemoryServerManager::default()))
            .unwrap();
        assert!(f.engine.is_polling());

        f.engine.stop();
        f.engine.stop();
        assert!(!f.engine.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn poller_ticks_until_disabled() {
        // No subscription: every attempt stops at a precondition.
        let f = fixture(Settings::default(), StaticAuthProvider::signed_in("t"));

        f.engine.set_enabled(true).unwrap();
        assert!(f.engine.is_polling());
        settle().await;
        let after_enable = f.settings.save_count();

        tokio::time::sleep(Duration::from_secs(11)).await;
        settle().await;
        assert!(f.settings.save_count() > after_enable);

        let status = f.engine.set_enabled(false).unwrap();
        assert!(!status.enabled);
        assert!(!f.engine.is_polling());
        let after_disable = f.settings.save_count();

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(f.settings.save_count(), after_disable);
    }

    #[tokio::test]
    async fn set_enabled_clears_last_error() {
        let mut settings = Settings::default();
        settings.cloud_sync = Some(SyncState {
            last_error: Some("Cloud sync failed: 500 Internal Server Error".into()),
            ..Default::default()
        });
        let f = fixture(settings, StaticAuthProvider::signed_out());

        let status = f.engine.set_enabled(false).unwrap();
        assert_eq!(status.last_error, None);
        assert!(status.encryption_available);
        assert!(!status.has_passphrase);
    }
}
