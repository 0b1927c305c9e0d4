//! Console-backed capabilities for running the controller without a phone
//!
//! Typed lines on stdin stand in for partial transcription results, toasts go
//! to stderr, and calls and position fixes shell out to configurable commands
//! (e.g. Termux's `termux-telephony-call` and `termux-location`).

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::platform::{
    Capabilities, LocationProvider, Notifier, PermissionState, Position, PositionOptions,
    RecognitionOptions, SpeechEngine, Telephony, Toast,
};
use crate::{Error, Result};

/// Capacity of the partial-result broadcast buffer
const RESULT_BUFFER: usize = 64;

/// Build console capabilities from configuration
///
/// Must be called inside a tokio runtime (the stdin reader is spawned here).
#[must_use]
pub fn capabilities(config: &Config) -> Capabilities {
    Capabilities {
        speech: Arc::new(StdinSpeechEngine::spawn()),
        location: Arc::new(CommandLocation::new(
            config.location.command.clone(),
            config.location.fixed,
        )),
        telephony: Arc::new(CommandTelephony::new(config.telephony.dial_command.clone())),
        notifier: Arc::new(ConsoleNotifier),
    }
}

/// Treats each stdin line as a single-candidate partial result
pub struct StdinSpeechEngine {
    results: broadcast::Sender<serde_json::Value>,
    active: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl StdinSpeechEngine {
    /// Start reading stdin in the background
    #[must_use]
    pub fn spawn() -> Self {
        let (results, _) = broadcast::channel(RESULT_BUFFER);
        let active = Arc::new(AtomicBool::new(false));

        let tx = results.clone();
        let is_active = Arc::clone(&active);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if !is_active.load(Ordering::SeqCst) {
                            tracing::debug!(line = %line, "not listening, input ignored");
                            continue;
                        }
                        // No receivers just means nobody is subscribed right now
                        let _ = tx.send(serde_json::json!({ "value": [line] }));
                    }
                    Ok(None) => {
                        tracing::debug!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read stdin");
                        break;
                    }
                }
            }
        });

        Self {
            results,
            active,
            reader,
        }
    }
}

impl Drop for StdinSpeechEngine {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl SpeechEngine for StdinSpeechEngine {
    fn name(&self) -> &'static str {
        "stdin"
    }

    async fn check_available(&self) -> Result<bool> {
        Ok(!self.reader.is_finished())
    }

    async fn request_permission(&self) -> Result<PermissionState> {
        Ok(PermissionState::Granted)
    }

    async fn start(&self, options: &RecognitionOptions) -> Result<()> {
        if self.reader.is_finished() {
            return Err(Error::EngineUnavailable);
        }
        tracing::debug!(language = %options.language, "stdin session started");
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<serde_json::Value> {
        self.results.subscribe()
    }
}

/// Prints toasts to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn show(&self, toast: &Toast) -> Result<()> {
        eprintln!("[sos] {}", toast.text);
        Ok(())
    }
}

/// Dials through an external command, or only logs when none is configured
#[derive(Debug, Clone)]
pub struct CommandTelephony {
    dial_command: Option<String>,
}

impl CommandTelephony {
    #[must_use]
    pub const fn new(dial_command: Option<String>) -> Self {
        Self { dial_command }
    }
}

#[async_trait]
impl Telephony for CommandTelephony {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn place_call(&self, number: &str, confirm_prompt: bool) -> Result<()> {
        let Some(dial_command) = &self.dial_command else {
            tracing::warn!(number, "no dial command configured, call not placed");
            eprintln!("[sos] would call {number}");
            return Ok(());
        };

        let mut command = shell_command(dial_command)
            .ok_or_else(|| Error::CallFailure("dial command is empty".to_string()))?;
        command.arg(number);

        tracing::info!(command = %dial_command, number, confirm_prompt, "dialing");

        let status = command
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::CallFailure(format!("failed to run dial command: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::CallFailure(format!("dial command exited with {status}")))
        }
    }
}

/// Reads the position from an external command, falling back to fixed coordinates
#[derive(Debug, Clone)]
pub struct CommandLocation {
    command: Option<String>,
    fixed: Option<Position>,
}

impl CommandLocation {
    #[must_use]
    pub const fn new(command: Option<String>, fixed: Option<Position>) -> Self {
        Self { command, fixed }
    }

    async fn run_command(command_line: &str) -> Result<Position> {
        let mut command = shell_command(command_line)
            .ok_or_else(|| Error::LocationUnavailable("location command is empty".to_string()))?;

        let output = command
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::LocationUnavailable(format!("failed to run command: {e}")))?;

        if !output.status.success() {
            return Err(Error::LocationUnavailable(format!(
                "location command exited with {}",
                output.status
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

#[async_trait]
impl LocationProvider for CommandLocation {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn check_permission(&self) -> Result<PermissionState> {
        Ok(PermissionState::Granted)
    }

    async fn request_permission(&self) -> Result<PermissionState> {
        Ok(PermissionState::Granted)
    }

    async fn current_position(&self, options: &PositionOptions) -> Result<Position> {
        if let Some(command_line) = &self.command {
            tracing::debug!(
                command = %command_line,
                high_accuracy = options.high_accuracy,
                "requesting position"
            );
            match Self::run_command(command_line).await {
                Ok(position) => return Ok(position),
                Err(e) if self.fixed.is_some() => {
                    tracing::warn!(error = %e, "location command failed, using fixed position");
                }
                Err(e) => return Err(e),
            }
        }

        self.fixed
            .ok_or_else(|| Error::LocationUnavailable("no location source configured".to_string()))
    }
}

/// Split a configured command line into a `Command`
fn shell_command(command_line: &str) -> Option<Command> {
    let mut parts = command_line.split_whitespace();
    let program = parts.next()?;
    let mut command = Command::new(program);
    command.args(parts);
    Some(command)
}
