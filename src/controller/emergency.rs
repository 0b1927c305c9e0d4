//! Emergency trigger sequence
//!
//! Stop listening, capture location, place the call. Location is auxiliary:
//! its failure is downgraded to a notification and never suppresses the call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::{EmergencyController, Phase, messages};
use crate::platform::Position;
use crate::{Error, Result};

/// How an emergency trigger ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyOutcome {
    /// The telephony capability accepted the call
    CallPlaced,
    /// The call could not be placed; the user was told to call directly
    CallFailed,
    /// Another trigger was already running; nothing was done
    AlreadyInProgress,
}

/// Record of one emergency trigger
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyReport {
    pub incident: Uuid,
    pub triggered_at: DateTime<Utc>,
    /// Number dialed (or attempted)
    pub contact: String,
    pub position: Option<Position>,
    pub map_link: Option<String>,
    pub outcome: EmergencyOutcome,
    /// Error description when the call failed
    pub failure: Option<String>,
}

impl EmergencyReport {
    fn new(contact: &str, outcome: EmergencyOutcome) -> Self {
        Self {
            incident: Uuid::new_v4(),
            triggered_at: Utc::now(),
            contact: contact.to_string(),
            position: None,
            map_link: None,
            outcome,
            failure: None,
        }
    }

    /// Check if the call went out
    #[must_use]
    pub fn call_placed(&self) -> bool {
        self.outcome == EmergencyOutcome::CallPlaced
    }
}

/// Result of trying to claim the trigger
enum Claim {
    /// The trigger is ours; `was_active` if a session had to be stopped
    Claimed { was_active: bool },
    InProgress,
    /// The detecting session was stopped or replaced first
    Superseded,
}

impl EmergencyController {
    /// Run the emergency sequence
    ///
    /// Callable from voice detection or a manual panic button, whether or not
    /// the controller is listening. Never fails: errors are reported to the
    /// user and recorded in the returned report.
    pub async fn trigger_emergency(&self) -> EmergencyReport {
        match self.claim_trigger(None).await {
            Claim::Claimed { was_active } => self.run_emergency(was_active).await,
            Claim::InProgress | Claim::Superseded => EmergencyReport::new(
                &self.inner.config.emergency.contact,
                EmergencyOutcome::AlreadyInProgress,
            ),
        }
    }

    /// Trigger from a detection made by the listener of session `epoch`
    ///
    /// A detection that raced with a stop or restart is dropped.
    pub(super) async fn trigger_from_voice(&self, epoch: u64) -> Option<EmergencyReport> {
        let was_active = match self.claim_trigger(Some(epoch)).await {
            Claim::Claimed { was_active } => was_active,
            Claim::InProgress => return None,
            Claim::Superseded => {
                tracing::debug!(epoch, "dropping detection from superseded session");
                return None;
            }
        };

        let report = self.run_emergency(was_active).await;
        tracing::info!(
            incident = %report.incident,
            outcome = ?report.outcome,
            "voice-triggered emergency finished"
        );
        Some(report)
    }

    /// Enter `Triggering` and cancel any pending restart, under one lock
    ///
    /// With `session`, the claim only succeeds while that session is current.
    async fn claim_trigger(&self, session: Option<u64>) -> Claim {
        let mut state = self.inner.state.lock().await;
        if state.phase == Phase::Triggering {
            tracing::warn!("emergency already in progress, ignoring trigger");
            return Claim::InProgress;
        }
        if session.is_some_and(|epoch| !state.is_current(epoch)) {
            return Claim::Superseded;
        }

        let was_active = Self::release_session(&mut state);
        state.phase = Phase::Triggering;
        Claim::Claimed { was_active }
    }

    async fn run_emergency(&self, was_active: bool) -> EmergencyReport {
        if was_active {
            self.finish_stop().await;
        }
        // Keep the microphone off for the call, even if a start was mid-flight
        self.settle_engine_starts().await;

        let contact = &self.inner.config.emergency.contact;
        let mut report = EmergencyReport::new(contact, EmergencyOutcome::CallPlaced);
        let span = tracing::info_span!("emergency", incident = %report.incident);

        async {
            tracing::warn!(contact = %contact, "emergency triggered");

            if let Err(e) = self.emergency_sequence(&mut report).await {
                tracing::error!(error = %e, "emergency action failed");
                self.notify(messages::EMERGENCY_FAILED).await;
                report.outcome = EmergencyOutcome::CallFailed;
                report.failure = Some(e.to_string());
            }
        }
        .instrument(span)
        .await;

        let mut state = self.inner.state.lock().await;
        if state.phase == Phase::Triggering {
            state.phase = Phase::Idle;
        }

        report
    }

    async fn emergency_sequence(&self, report: &mut EmergencyReport) -> Result<()> {
        self.notify(messages::EMERGENCY_INITIATING).await;

        match self.acquire_position().await {
            Ok(position) => {
                let link = position.map_link(&self.inner.config.location.map_url);
                tracing::info!(location = %link, "location captured");
                self.notify(&format!("{}{link}", messages::LOCATION_CAPTURED_PREFIX))
                    .await;
                report.position = Some(position);
                report.map_link = Some(link);
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not get location");
                self.notify(messages::LOCATION_UNAVAILABLE).await;
            }
        }

        self.notify(messages::PLACING_CALL).await;

        let emergency = &self.inner.config.emergency;
        self.inner
            .caps
            .telephony
            .place_call(&emergency.contact, emergency.confirm_prompt)
            .await
            .map_err(|e| match e {
                Error::CallFailure(_) => e,
                other => Error::CallFailure(other.to_string()),
            })?;

        tracing::info!(contact = %emergency.contact, "emergency call placed");
        Ok(())
    }

    /// Current position, bounded by the configured hard timeout
    ///
    /// # Errors
    ///
    /// Returns `LocationUnavailable` on provider failure or timeout
    async fn acquire_position(&self) -> Result<Position> {
        let options = self.inner.config.location.options();
        let request = self.inner.caps.location.current_position(&options);

        match tokio::time::timeout(options.timeout, request).await {
            Ok(Ok(position)) => Ok(position),
            Ok(Err(Error::LocationUnavailable(reason))) => Err(Error::LocationUnavailable(reason)),
            Ok(Err(e)) => Err(Error::LocationUnavailable(e.to_string())),
            Err(_) => Err(Error::LocationUnavailable(format!(
                "timed out after {}ms",
                options.timeout.as_millis()
            ))),
        }
    }
}
