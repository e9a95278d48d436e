//! The [`Desk`] facade: one allocation store, one session store, and the
//! wiring between them.
//!
//! Presentation layers talk to the desk only through this type. Every
//! mutation becomes a [`DeskAction`] sent to the allocation store, which
//! persists the new state before returning.

use crate::allocation::{AllocationReducer, DeskAction, DeskEnvironment, DeskState, UuidGenerator};
use crate::config::DeskConfig;
use crate::error::{DeskError, Result};
use crate::model::{AppState, WaiterId};
use crate::notify::{MessageDispatcher, MessageTemplates};
use crate::persistence::{BlobSink, BlobStore, LoadOutcome, load_app_state};
use crate::session::{
    ExpiryHook, SessionAction, SessionEnvironment, SessionReducer, SessionState, SessionTimeouts,
};
use crate::snapshot;
use crate::view::{self, DeskStats};
use chrono::FixedOffset;
use futures::future::BoxFuture;
use slotdesk_core::environment::{Clock, IdGenerator, SystemClock};
use slotdesk_runtime::{EffectHandle, HealthCheck, PersistError, Store};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

const RESET_WAIT: Duration = Duration::from_secs(5);

/// Store running the allocation reducer
pub type AllocationStore = Store<DeskState, DeskAction, DeskEnvironment, AllocationReducer>;

/// Store running the session guard
pub type SessionStore = Store<SessionState, SessionAction, SessionEnvironment, SessionReducer>;

/// Sends [`DeskAction::ForceReset`] when the session expires
#[derive(Clone)]
pub struct ResetDeskOnExpiry {
    store: AllocationStore,
}

impl ResetDeskOnExpiry {
    /// Reset `store` on expiry
    #[must_use]
    pub const fn new(store: AllocationStore) -> Self {
        Self { store }
    }
}

impl ExpiryHook for ResetDeskOnExpiry {
    fn on_expired(&self) -> BoxFuture<'static, ()> {
        let store = self.store.clone();
        Box::pin(async move {
            if let Err(error) = store.send(DeskAction::ForceReset).await {
                tracing::warn!(%error, "Could not reset desk after session expiry");
            }
        })
    }
}

/// Everything the desk needs besides storage
#[derive(Clone)]
pub struct DeskOptions {
    /// Clock for timestamps and countdowns
    pub clock: Arc<dyn Clock>,
    /// Id source for new records
    pub ids: Arc<dyn IdGenerator>,
    /// Receives message intents
    pub dispatcher: Arc<dyn MessageDispatcher>,
    /// Message bodies and link format
    pub templates: MessageTemplates,
    /// Session guard timers
    pub timeouts: SessionTimeouts,
    /// Offset for report timestamps and "today"
    pub utc_offset: FixedOffset,
}

impl DeskOptions {
    /// Production wiring: system clock, UUID ids, configured templates
    #[must_use]
    pub fn from_config(config: &DeskConfig, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            dispatcher,
            templates: MessageTemplates::new(config.program_name.clone(), config.sms_platform),
            timeouts: config.timeouts,
            utc_offset: config.utc_offset,
        }
    }
}

/// Result of an accepted operation
#[derive(Debug)]
pub struct Outcome {
    /// Effects spawned by the operation (message dispatch)
    pub handle: EffectHandle,
    /// Set when the new state may not have reached durable storage
    pub persist_warning: Option<PersistError>,
}

impl Outcome {
    /// Wait for the operation's effects to finish
    pub async fn settled(mut self) -> Option<PersistError> {
        self.handle.wait().await;
        self.persist_warning
    }
}

/// The desk: allocation, session guard and snapshot exchange behind one handle
#[derive(Clone)]
pub struct Desk {
    allocation: AllocationStore,
    session: SessionStore,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
    loaded: LoadOutcome,
}

impl Desk {
    /// Load the persisted state from `blobs` and build both stores
    ///
    /// The session timer is not running until [`Desk::start_session`].
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Blob`] when the storage backend cannot be read.
    pub fn open(blobs: Arc<dyn BlobStore>, options: DeskOptions) -> Result<Self> {
        let (app, loaded) = load_app_state(blobs.as_ref())?;

        let env = DeskEnvironment::new(
            Arc::clone(&options.clock),
            options.ids,
            options.dispatcher,
            options.templates,
        );
        let allocation = Store::new(DeskState::new(app), AllocationReducer::new(), env)
            .persisted_by(Arc::new(BlobSink::new(Arc::clone(&blobs))));

        let session_env = SessionEnvironment::new(
            Arc::clone(&options.clock),
            options.timeouts,
            Arc::new(ResetDeskOnExpiry::new(allocation.clone())),
        );
        let session = Store::new(SessionState::default(), SessionReducer::new(), session_env);

        Ok(Self {
            allocation,
            session,
            blobs,
            clock: options.clock,
            utc_offset: options.utc_offset,
            loaded,
        })
    }

    /// How the startup load went
    #[must_use]
    pub const fn load_outcome(&self) -> &LoadOutcome {
        &self.loaded
    }

    /// The allocation store, for subscribing to applied actions
    #[must_use]
    pub const fn allocation_store(&self) -> &AllocationStore {
        &self.allocation
    }

    /// The session store, for subscribing to guard transitions
    #[must_use]
    pub const fn session_store(&self) -> &SessionStore {
        &self.session
    }

    /// The storage backend
    #[must_use]
    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.blobs)
    }

    // ═══════════════════════════════════════════════════════════
    // Allocation
    // ═══════════════════════════════════════════════════════════

    /// Send any action and turn a rejection into an error
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Rejected`] when the reducer refuses the action and
    /// [`DeskError::Store`] when the store is shutting down.
    pub async fn send(&self, action: DeskAction) -> Result<Outcome> {
        let receipt = self
            .allocation
            .send_and_inspect(action, |s| s.last_rejection.clone())
            .await?;

        if let Some(warning) = &receipt.persist_warning {
            tracing::warn!(%warning, "Last change may not have reached durable storage");
        }

        match receipt.inspected {
            Some(rejection) => Err(DeskError::Rejected(rejection)),
            None => Ok(Outcome {
                handle: receipt.handle,
                persist_warning: receipt.persist_warning,
            }),
        }
    }

    /// Admit a named participant into a free slot
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn admit(&self, slot_id: usize, name: &str, memo: Option<&str>) -> Result<Outcome> {
        self.send(DeskAction::Admit {
            slot_id,
            name: name.to_string(),
            memo: memo.map(str::to_string),
            from_waitlist: false,
        })
        .await
    }

    /// Admit the front waiter into a free slot
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn admit_next_waiter(&self, slot_id: usize, memo: Option<&str>) -> Result<Outcome> {
        self.send(DeskAction::Admit {
            slot_id,
            name: String::new(),
            memo: memo.map(str::to_string),
            from_waitlist: true,
        })
        .await
    }

    /// Admit a walk-in directly, bypassing the queue
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn direct_admit(&self, name: &str, phone: &str, slot_id: usize) -> Result<Outcome> {
        self.send(DeskAction::DirectAdmit {
            name: name.to_string(),
            phone: phone.to_string(),
            slot_id,
        })
        .await
    }

    /// Free an occupied slot
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn release(&self, slot_id: usize) -> Result<Outcome> {
        self.send(DeskAction::Release { slot_id }).await
    }

    /// Change the number of slots
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn resize(&self, count: usize) -> Result<Outcome> {
        self.send(DeskAction::Resize { count }).await
    }

    /// Add someone to the waiting list
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn enqueue_waiter(&self, name: &str, phone: &str) -> Result<Outcome> {
        self.send(DeskAction::EnqueueWaiter {
            name: name.to_string(),
            phone: phone.to_string(),
        })
        .await
    }

    /// Remove a waiter
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn dequeue_waiter(&self, id: &WaiterId) -> Result<Outcome> {
        self.send(DeskAction::DequeueWaiter { id: id.clone() }).await
    }

    /// Call a waiter forward
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn notify_waiter(&self, id: &WaiterId) -> Result<Outcome> {
        self.send(DeskAction::NotifyWaiter { id: id.clone() }).await
    }

    /// Re-send a waiter their queue position
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn remind_waiter(&self, id: &WaiterId) -> Result<Outcome> {
        self.send(DeskAction::RemindWaiter { id: id.clone() }).await
    }

    /// Wipe everything back to three empty slots
    ///
    /// # Errors
    ///
    /// See [`Desk::send`].
    pub async fn force_reset(&self) -> Result<Outcome> {
        self.send(DeskAction::ForceReset).await
    }

    /// Current application state
    pub async fn snapshot(&self) -> AppState {
        self.allocation.state(|s| s.app.clone()).await
    }

    /// Dashboard numbers at the current time
    pub async fn stats(&self) -> DeskStats {
        let now = self.clock.now();
        let offset = self.utc_offset;
        self.allocation
            .state(|s| view::stats(&s.app, now, offset))
            .await
    }

    // ═══════════════════════════════════════════════════════════
    // Snapshot exchange
    // ═══════════════════════════════════════════════════════════

    /// Pretty-printed JSON backup of the current state
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Snapshot`] if serialization fails.
    pub async fn export_backup(&self) -> Result<String> {
        Ok(self
            .allocation
            .state(|s| snapshot::export_backup(&s.app))
            .await?)
    }

    /// Validate a backup and install it
    ///
    /// An invalid document leaves the current state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Snapshot`] for an invalid document.
    pub async fn import_backup(&self, raw: &str) -> Result<Outcome> {
        let state = snapshot::parse_state(raw).inspect_err(|error| {
            tracing::warn!(%error, "Backup rejected");
        })?;
        self.send(DeskAction::Restore {
            state: Box::new(state),
        })
        .await
    }

    /// CSV report of the current state
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Snapshot`] if the report cannot be written.
    pub async fn export_report(&self) -> Result<Vec<u8>> {
        let now = self.clock.now();
        let offset = self.utc_offset;
        Ok(self
            .allocation
            .state(|s| snapshot::export_report(&s.app, now, offset))
            .await?)
    }

    /// Write the CSV report into `dir` under its default name
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Snapshot`] if the report cannot be built or written.
    pub async fn write_report(&self, dir: &Path) -> Result<PathBuf> {
        let bytes = self.export_report().await?;
        let path = dir.join(snapshot::report_file_name(self.clock.now()));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(crate::error::SnapshotError::from)?;
        tracing::info!(path = %path.display(), "Report written");
        Ok(path)
    }

    /// Write the JSON backup into `dir` under its default name
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Snapshot`] if the backup cannot be built or written.
    pub async fn write_backup(&self, dir: &Path) -> Result<PathBuf> {
        let json = self.export_backup().await?;
        let path = dir.join(snapshot::backup_file_name(self.clock.now()));
        tokio::fs::write(&path, json)
            .await
            .map_err(crate::error::SnapshotError::from)?;
        tracing::info!(path = %path.display(), "Backup written");
        Ok(path)
    }

    /// Read a backup file and install it
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Snapshot`] if the file cannot be read or is invalid.
    pub async fn restore_from_file(&self, path: &Path) -> Result<Outcome> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(crate::error::SnapshotError::from)?;
        self.import_backup(&raw).await
    }

    // ═══════════════════════════════════════════════════════════
    // Session guard
    // ═══════════════════════════════════════════════════════════

    /// Arm the inactivity timer
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Store`] when the store is shutting down.
    pub async fn start_session(&self) -> Result<()> {
        self.session.send(SessionAction::Start).await?;
        Ok(())
    }

    /// Report operator activity
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Store`] when the store is shutting down.
    pub async fn activity(&self) -> Result<()> {
        self.session.send(SessionAction::Activity).await?;
        Ok(())
    }

    /// Acknowledge the inactivity warning
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Store`] when the store is shutting down.
    pub async fn continue_session(&self) -> Result<()> {
        self.session.send(SessionAction::Continue).await?;
        Ok(())
    }

    /// Reset immediately from the warning dialog
    ///
    /// Returns `false` when no warning was showing, in which case nothing
    /// happens. Otherwise waits until the desk has been wiped.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Store`] when the store is shutting down.
    pub async fn reset_now(&self) -> Result<bool> {
        let mut applied = self.allocation.subscribe_actions();
        let before = self.session.state(|s| s.expirations).await;
        let receipt = self
            .session
            .send_and_inspect(SessionAction::ResetNow, |s| s.expirations)
            .await?;
        if receipt.inspected == before {
            return Ok(false);
        }

        // The wipe runs as an effect of the session store
        let wiped = async {
            loop {
                match applied.recv().await {
                    Ok(DeskAction::ForceReset) | Err(RecvError::Closed) => break,
                    Ok(_) | Err(RecvError::Lagged(_)) => {},
                }
            }
        };
        if tokio::time::timeout(RESET_WAIT, wiped).await.is_err() {
            tracing::warn!("Desk reset did not complete in time");
        }
        Ok(true)
    }

    /// Current guard state
    pub async fn session_state(&self) -> SessionState {
        self.session.state(SessionState::clone).await
    }

    /// Time left before the forced reset, while the warning shows
    pub async fn warning_remaining(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.session.state(|s| s.remaining(now)).await
    }

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Health of the allocation store (degraded after a failed write)
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        self.allocation.health()
    }

    /// Stop accepting actions and wait for in-flight effects
    ///
    /// The session store goes first: its armed timer is aborted and a reset
    /// already in flight gets to reach the allocation store.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Store`] if either store's effects outlive `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.session.shutdown(Some(timeout)).await?;
        self.allocation.shutdown(Some(timeout)).await?;
        Ok(())
    }
}
