//! Controller state and owned background handles

use std::future::Future;

use serde::Serialize;
use tokio::task::JoinHandle;

/// Lifecycle phase of the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not listening
    #[default]
    Idle,
    /// Checking location and microphone permissions
    RequestingPermissions,
    /// Recognition session active, or being set up
    Listening,
    /// Replacing the current recognition session with a fresh one
    Restarting,
    /// Emergency sequence in progress
    Triggering,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::RequestingPermissions => write!(f, "requesting permissions"),
            Self::Listening => write!(f, "listening"),
            Self::Restarting => write!(f, "restarting"),
            Self::Triggering => write!(f, "triggering"),
        }
    }
}

/// A spawned task that is aborted when the handle is dropped
#[derive(Debug)]
pub(crate) struct ScopedTask(JoinHandle<()>);

impl ScopedTask {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(future))
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Mutable controller state
///
/// Only the controller's own methods touch this, always under its lock and
/// never across a capability call.
#[derive(Debug, Default)]
pub(crate) struct ControllerState {
    pub phase: Phase,
    /// A recognition session is installed (engine started, listener and timer live)
    pub listening: bool,
    /// Consecutive setup failures since the last successful start
    pub retry_count: u32,
    /// Session generation; continuations from older generations are discarded
    pub epoch: u64,
    pub listener: Option<ScopedTask>,
    pub restart_timer: Option<ScopedTask>,
    pub torn_down: bool,
}

impl ControllerState {
    /// Start a new generation, invalidating every in-flight continuation
    pub fn advance_epoch(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.epoch
    }

    /// Whether a continuation captured at `epoch` may still act
    pub const fn is_current(&self, epoch: u64) -> bool {
        !self.torn_down && self.epoch == epoch
    }

    /// Release the restart timer and the listener, in that order
    ///
    /// The timer goes first so a pending restart can never outlive a stop.
    pub fn release_handles(&mut self) {
        self.restart_timer = None;
        self.listener = None;
        self.listening = false;
    }

    /// Anything to clean up: a session, handles, or a start in flight
    pub fn is_active(&self) -> bool {
        self.listening
            || self.listener.is_some()
            || self.restart_timer.is_some()
            || matches!(
                self.phase,
                Phase::RequestingPermissions | Phase::Listening | Phase::Restarting
            )
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            phase: self.phase,
            listening: self.listening,
            retry_count: self.retry_count,
            has_listener: self.listener.is_some(),
            has_restart_timer: self.restart_timer.is_some(),
            torn_down: self.torn_down,
        }
    }
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControllerSnapshot {
    pub phase: Phase,
    pub listening: bool,
    pub retry_count: u32,
    pub has_listener: bool,
    pub has_restart_timer: bool,
    pub torn_down: bool,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_scoped_task_aborts_on_drop() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let task = ScopedTask::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });
        drop(task);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_epoch_invalidates_continuations() {
        let mut state = ControllerState::default();
        let first = state.advance_epoch();
        assert!(state.is_current(first));

        let second = state.advance_epoch();
        assert!(!state.is_current(first));
        assert!(state.is_current(second));

        state.torn_down = true;
        assert!(!state.is_current(second));
    }

    #[test]
    fn test_idle_state_is_inactive() {
        let state = ControllerState::default();
        assert!(!state.is_active());
        assert_eq!(state.snapshot().phase, Phase::Idle);
    }

    #[test]
    fn test_requesting_permissions_is_active() {
        let state = ControllerState {
            phase: Phase::RequestingPermissions,
            ..ControllerState::default()
        };
        assert!(state.is_active());
    }
}
