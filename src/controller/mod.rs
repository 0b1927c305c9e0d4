//! Emergency voice controller
//!
//! Owns the recognition lifecycle (start, restart, retry, stop), feeds partial
//! results to the phrase detector, and runs the emergency sequence on a match.
//!
//! ```text
//!            start                 permissions ok
//!   Idle ──────────► Requesting ─────────────────► Listening ◄──┐
//!    ▲               Permissions                     │   │      │ fresh session
//!    │ stop / give up     │ unavailable / denied     │   └──► Restarting
//!    ├────────────────────┘                          │ trigger phrase
//!    └──────────────────────────────────────── Triggering
//! ```
//!
//! The controller is a cheap handle over shared state. Background work (the
//! result listener and the restart timer) runs on owned tasks that are
//! aborted when released, and holds only a weak reference back.

mod emergency;
mod retry;
mod state;

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

pub use emergency::{EmergencyOutcome, EmergencyReport};
pub use retry::RetryPolicy;
pub use state::{ControllerSnapshot, Phase};

use state::{ControllerState, ScopedTask};

use crate::platform::{Capabilities, PermissionState, Toast};
use crate::voice::PhraseDetector;
use crate::{Config, Error, Result};

/// User-facing notification texts
pub mod messages {
    pub const LISTENING: &str = "Listening for emergency commands...";
    pub const STOPPED: &str = "Emergency detection stopped";
    pub const ENGINE_UNAVAILABLE: &str = "Speech recognition not available";
    pub const MICROPHONE_DENIED: &str = "Microphone permission denied";
    pub const PERMISSION_SETUP_FAILED: &str = "Permission setup failed";
    pub const SETUP_FAILED: &str = "Failed to initialize speech recognition";
    pub const EMERGENCY_INITIATING: &str = "Initiating emergency response...";
    pub const LOCATION_CAPTURED_PREFIX: &str = "Location captured: ";
    pub const LOCATION_UNAVAILABLE: &str = "Could not get location, proceeding with call";
    pub const PLACING_CALL: &str = "Placing emergency call...";
    pub const EMERGENCY_FAILED: &str =
        "Emergency action failed. Please try again or call emergency services directly.";
}

/// Longest a trigger waits for a pending engine start to wind down
const ENGINE_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

struct Inner {
    config: Config,
    caps: Capabilities,
    detector: PhraseDetector,
    retry: RetryPolicy,
    state: Mutex<ControllerState>,
    /// Engine `start` calls that have not returned (or been cleaned up) yet
    starts_in_flight: watch::Sender<u32>,
}

/// Counts one engine start as in flight until dropped
struct StartInFlight<'a>(&'a watch::Sender<u32>);

impl<'a> StartInFlight<'a> {
    fn begin(counter: &'a watch::Sender<u32>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter)
    }
}

impl Drop for StartInFlight<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Voice-triggered emergency controller
#[derive(Clone)]
pub struct EmergencyController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EmergencyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmergencyController")
            .field("contact", &self.inner.config.emergency.contact)
            .field("phrases", &self.inner.detector.phrases())
            .field("caps", &self.inner.caps)
            .finish_non_exhaustive()
    }
}

impl EmergencyController {
    /// Create a controller in the `Idle` phase
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(config: Config, caps: Capabilities) -> Result<Self> {
        config.validate()?;
        let detector = PhraseDetector::new(&config.recognition.trigger_phrases)?;
        let retry = RetryPolicy::from_config(&config.recognition);

        tracing::debug!(
            contact = %config.emergency.contact,
            ?caps,
            "emergency controller created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                caps,
                detector,
                retry,
                state: Mutex::new(ControllerState::default()),
                starts_in_flight: watch::Sender::new(0),
            }),
        })
    }

    /// Controller configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Current state
    pub async fn snapshot(&self) -> ControllerSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    /// Check if a recognition session is installed
    pub async fn is_listening(&self) -> bool {
        self.inner.state.lock().await.listening
    }

    /// Start continuous listening for the trigger phrase
    ///
    /// No-op unless the controller is idle.
    ///
    /// # Errors
    ///
    /// - `TornDown` after [`teardown`](Self::teardown)
    /// - `EngineUnavailable` / `PermissionDenied` if permissions fail
    /// - `SetupFailure` once every setup attempt has failed
    pub async fn start_listening(&self) -> Result<()> {
        let epoch = {
            let mut state = self.inner.state.lock().await;
            if state.torn_down {
                return Err(Error::TornDown);
            }
            if state.phase != Phase::Idle {
                tracing::debug!(phase = %state.phase, "start ignored, controller busy");
                return Ok(());
            }

            state.phase = Phase::RequestingPermissions;
            state.retry_count = 0;
            state.advance_epoch()
        };

        tracing::info!(epoch, "starting emergency detection");

        if let Err(e) = self.setup_permissions().await {
            let mut state = self.inner.state.lock().await;
            if state.is_current(epoch) {
                state.phase = Phase::Idle;
            }
            return Err(e);
        }

        {
            let mut state = self.inner.state.lock().await;
            if !state.is_current(epoch) {
                tracing::debug!(epoch, "start superseded while requesting permissions");
                return Ok(());
            }
            state.phase = Phase::Listening;
        }

        self.enter_listening(epoch).await
    }

    /// Stop listening and release every session resource
    ///
    /// Idempotent and safe from any phase.
    pub async fn stop_listening(&self) {
        let was_active = Self::release_session(&mut *self.inner.state.lock().await);
        if was_active {
            tracing::info!("emergency detection stopped");
        }

        self.finish_stop().await;
    }

    /// Replace the current recognition session with a fresh one
    ///
    /// No-op unless a session is installed.
    pub async fn restart_listening(&self) {
        let epoch = {
            let state = self.inner.state.lock().await;
            if !state.listening {
                tracing::debug!("restart ignored, not listening");
                return;
            }
            state.epoch
        };

        self.restart_session(epoch).await;
    }

    /// Release everything for good; the controller cannot start again
    ///
    /// Call when the hosting screen goes away.
    pub async fn teardown(&self) {
        let was_active = {
            let mut state = self.inner.state.lock().await;
            let was_active = Self::release_session(&mut state);
            state.torn_down = true;
            was_active
        };

        if was_active {
            if let Err(e) = self.inner.caps.speech.stop().await {
                tracing::warn!(error = %e, "failed to stop speech engine during teardown");
            }
        }

        tracing::info!("emergency controller torn down");
    }

    /// Cancel the restart timer, drop the listener, and invalidate in-flight work
    ///
    /// Returns whether there was anything to stop.
    fn release_session(state: &mut ControllerState) -> bool {
        let was_active = state.is_active();
        state.release_handles();

        if was_active {
            state.advance_epoch();
            if state.phase != Phase::Triggering {
                state.phase = Phase::Idle;
            }
        }

        was_active
    }

    /// Engine stop and user notification, after state cleanup
    async fn finish_stop(&self) {
        if let Err(e) = self.inner.caps.speech.stop().await {
            tracing::warn!(error = %e, "failed to stop speech engine");
        }
        self.notify(messages::STOPPED).await;
    }

    async fn setup_permissions(&self) -> Result<()> {
        match self.check_permissions().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let text = match e {
                    Error::EngineUnavailable => messages::ENGINE_UNAVAILABLE,
                    Error::PermissionDenied(_) => messages::MICROPHONE_DENIED,
                    _ => messages::PERMISSION_SETUP_FAILED,
                };
                tracing::warn!(error = %e, "permission setup failed");
                self.notify(text).await;
                Err(e)
            }
        }
    }

    async fn check_permissions(&self) -> Result<()> {
        let caps = &self.inner.caps;

        // Location is auxiliary: ask, but a refusal does not block listening
        let location = caps.location.check_permission().await?;
        if !location.is_granted() {
            let location = caps.location.request_permission().await?;
            tracing::debug!(%location, "location permission requested");
        }

        if !caps.speech.check_available().await? {
            return Err(Error::EngineUnavailable);
        }

        match caps.speech.request_permission().await? {
            PermissionState::Denied => Err(Error::PermissionDenied(
                "speech recognition".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Start an engine session for `epoch`, retrying within the policy budget
    async fn enter_listening(&self, epoch: u64) -> Result<()> {
        let options = self.inner.config.recognition.options();

        loop {
            {
                let mut state = self.inner.state.lock().await;
                if !state.is_current(epoch) {
                    return Ok(());
                }
                state.listener = None;
            }

            self.notify(messages::LISTENING).await;
            let in_flight = StartInFlight::begin(&self.inner.starts_in_flight);
            let attempt = self.inner.caps.speech.start(&options).await;

            let mut state = self.inner.state.lock().await;
            if !state.is_current(epoch) {
                // A newer session owns the engine unless the controller went quiet
                let orphaned = attempt.is_ok() && (state.torn_down || !state.is_active());
                drop(state);
                tracing::debug!(epoch, "session superseded during engine start");
                if orphaned {
                    if let Err(e) = self.inner.caps.speech.stop().await {
                        tracing::warn!(error = %e, "failed to stop superseded session");
                    }
                }
                drop(in_flight);
                return Ok(());
            }
            drop(in_flight);

            let e = match attempt {
                Ok(()) => {
                    self.install_session(&mut state, epoch);
                    return Ok(());
                }
                Err(e) => e,
            };

            let delay = if e.is_retryable() {
                self.inner.retry.delay_for_retry(state.retry_count)
            } else {
                None
            };

            if let Some(delay) = delay {
                state.retry_count += 1;
                tracing::warn!(
                    attempt = state.retry_count,
                    max_attempts = self.inner.retry.total_attempts(),
                    error = %e,
                    "speech recognition setup failed, retrying"
                );
                drop(state);
                tokio::time::sleep(delay).await;
                continue;
            }

            let attempts = state.retry_count + 1;
            state.release_handles();
            state.phase = Phase::Idle;
            drop(state);

            tracing::error!(
                attempts,
                retryable = e.is_retryable(),
                error = %e,
                "speech recognition setup failed permanently"
            );
            self.notify(messages::SETUP_FAILED).await;
            return Err(Error::SetupFailure(e.to_string()));
        }
    }

    /// Subscribe the listener and arm the restart timer for a started session
    fn install_session(&self, state: &mut ControllerState, epoch: u64) {
        // Replacing the handles drops (and aborts) any predecessor
        let receiver = self.inner.caps.speech.subscribe();
        state.listener = Some(ScopedTask::spawn(listen_for_trigger(
            Arc::downgrade(&self.inner),
            receiver,
            epoch,
        )));
        state.restart_timer = Some(ScopedTask::spawn(restart_after(
            Arc::downgrade(&self.inner),
            self.inner.config.recognition.restart_interval,
            epoch,
        )));

        state.listening = true;
        state.phase = Phase::Listening;
        state.retry_count = 0;

        tracing::info!(epoch, "listening for trigger phrase");
    }

    /// Tear down session `epoch` and start a fresh one
    async fn restart_session(&self, epoch: u64) {
        let next = {
            let mut state = self.inner.state.lock().await;
            if !state.is_current(epoch) || !state.listening {
                tracing::debug!(epoch, "restart skipped, session superseded");
                return;
            }

            state.release_handles();
            state.phase = Phase::Restarting;
            state.advance_epoch()
        };

        tracing::debug!(from = epoch, to = next, "restarting recognition session");

        if let Err(e) = self.inner.caps.speech.stop().await {
            tracing::warn!(error = %e, "failed to stop session before restart");
        }

        if let Err(e) = self.enter_listening(next).await {
            tracing::warn!(error = %e, "restart failed");
        }
    }

    /// Wait, within a bound, until no engine start is pending
    ///
    /// A start that was superseded stops the engine again once it returns.
    async fn settle_engine_starts(&self) {
        let mut in_flight = self.inner.starts_in_flight.subscribe();
        let settled = tokio::time::timeout(
            ENGINE_SETTLE_TIMEOUT,
            in_flight.wait_for(|pending| *pending == 0),
        )
        .await
        .is_ok_and(|idle| idle.is_ok());

        if !settled {
            tracing::warn!(
                timeout_ms = ENGINE_SETTLE_TIMEOUT.as_millis(),
                "speech engine start still pending, continuing"
            );
        }
    }

    async fn notify(&self, text: &str) {
        let settings = self.inner.config.notification;
        let toast = Toast {
            text: text.to_string(),
            duration: settings.duration,
            position: settings.position,
        };

        if let Err(e) = self.inner.caps.notifier.show(&toast).await {
            tracing::warn!(error = %e, text, "failed to show notification");
        }
    }
}

/// Consume partial results for session `epoch` until the trigger phrase is heard
async fn listen_for_trigger(
    inner: Weak<Inner>,
    receiver: broadcast::Receiver<serde_json::Value>,
    epoch: u64,
) {
    let mut results = BroadcastStream::new(receiver);

    while let Some(item) = results.next().await {
        let payload = match item {
            Ok(payload) => payload,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "partial results lagged");
                continue;
            }
        };

        let Some(inner) = inner.upgrade() else {
            return;
        };

        if inner.detector.detect(&payload) {
            // The trigger stops this session, which aborts this task; run it detached
            let controller = EmergencyController { inner };
            tokio::spawn(async move {
                controller.trigger_from_voice(epoch).await;
            });
            return;
        }
    }

    tracing::debug!(epoch, "partial result stream closed");
}

/// Force a restart of session `epoch` once `interval` elapses
async fn restart_after(inner: Weak<Inner>, interval: Duration, epoch: u64) {
    tokio::time::sleep(interval).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };

    // Restart releases this timer, which aborts this task; run it detached
    let controller = EmergencyController { inner };
    tokio::spawn(async move { controller.restart_session(epoch).await });
}
