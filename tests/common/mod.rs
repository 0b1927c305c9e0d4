//! Shared test utilities: scripted capabilities and a controller harness

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};

use voice_sos::platform::{PositionOptions, RecognitionOptions, Toast};
use voice_sos::{
    Capabilities, Config, EmergencyController, Error, LocationProvider, Notifier,
    PermissionState, Position, Result, SpeechEngine, Telephony,
};

/// Ordered record of capability calls across all fakes
#[derive(Debug, Default, Clone)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Index of the first entry equal to `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    /// Index of the last entry equal to `entry`
    pub fn last_position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().rposition(|e| e == entry)
    }
}

/// Speech engine driven by the test
pub struct FakeSpeech {
    log: CallLog,
    results: broadcast::Sender<serde_json::Value>,
    pub available: AtomicBool,
    pub permission: Mutex<PermissionState>,
    /// Number of upcoming `start` calls that fail; `u32::MAX` fails forever
    pub failing_starts: AtomicU32,
    pub start_calls: AtomicU32,
    pub stop_calls: AtomicU32,
    pub last_options: Mutex<Option<RecognitionOptions>>,
    /// When set, `request_permission` waits for a notification
    pub permission_gate: Mutex<Option<Arc<Notify>>>,
    /// When set, each `start` waits for a notification before answering
    pub start_gate: Mutex<Option<Arc<Notify>>>,
    /// Make `start` fail with an error that retrying cannot fix
    pub start_revoked: AtomicBool,
}

impl FakeSpeech {
    fn new(log: CallLog) -> Self {
        let (results, _) = broadcast::channel(16);
        Self {
            log,
            results,
            available: AtomicBool::new(true),
            permission: Mutex::new(PermissionState::Granted),
            failing_starts: AtomicU32::new(0),
            start_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
            last_options: Mutex::new(None),
            permission_gate: Mutex::new(None),
            start_gate: Mutex::new(None),
            start_revoked: AtomicBool::new(false),
        }
    }

    /// Deliver a raw partial-result payload to subscribers
    pub fn emit(&self, payload: serde_json::Value) {
        let _ = self.results.send(payload);
    }

    /// Live subscriptions to the result stream
    pub fn subscribers(&self) -> usize {
        self.results.receiver_count()
    }

    pub fn starts(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u32 {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Hold every later `start` until the returned gate is notified
    pub fn gate_starts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl SpeechEngine for FakeSpeech {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn check_available(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn request_permission(&self) -> Result<PermissionState> {
        let gate = self.permission_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(*self.permission.lock().unwrap())
    }

    async fn start(&self, options: &RecognitionOptions) -> Result<()> {
        self.log.push("speech.start");
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());

        let gate = self.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.log.push("speech.start.done");

        if self.start_revoked.load(Ordering::SeqCst) {
            return Err(Error::PermissionDenied("microphone revoked".to_string()));
        }

        let failing = self.failing_starts.load(Ordering::SeqCst);
        if failing > 0 {
            if failing != u32::MAX {
                self.failing_starts.store(failing - 1, Ordering::SeqCst);
            }
            return Err(Error::SetupFailure("engine busy".to_string()));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.log.push("speech.stop");
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<serde_json::Value> {
        self.results.subscribe()
    }
}

/// What the fake location provider does when asked for a fix
#[derive(Debug, Clone, Copy)]
pub enum LocationBehavior {
    Fix(Position),
    Fail,
    /// Never answers; only the controller's timeout ends the request
    Hang,
}

pub struct FakeLocation {
    log: CallLog,
    pub behavior: Mutex<LocationBehavior>,
    pub permission: Mutex<PermissionState>,
    pub permission_requests: AtomicU32,
    pub last_options: Mutex<Option<PositionOptions>>,
}

#[async_trait]
impl LocationProvider for FakeLocation {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn check_permission(&self) -> Result<PermissionState> {
        Ok(*self.permission.lock().unwrap())
    }

    async fn request_permission(&self) -> Result<PermissionState> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        Ok(*self.permission.lock().unwrap())
    }

    async fn current_position(&self, options: &PositionOptions) -> Result<Position> {
        self.log.push("location.begin");
        *self.last_options.lock().unwrap() = Some(*options);

        let behavior = *self.behavior.lock().unwrap();
        let result = match behavior {
            LocationBehavior::Fix(position) => Ok(position),
            LocationBehavior::Fail => Err(Error::PermissionDenied("location".to_string())),
            LocationBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending never resolves")
            }
        };

        self.log.push("location.end");
        result
    }
}

pub struct FakeTelephony {
    log: CallLog,
    pub calls: Mutex<Vec<(String, bool)>>,
    pub fail: AtomicBool,
}

impl FakeTelephony {
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Telephony for FakeTelephony {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn place_call(&self, number: &str, confirm_prompt: bool) -> Result<()> {
        self.log.push("telephony.call");
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::CallFailure("no signal".to_string()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((number.to_string(), confirm_prompt));
        Ok(())
    }
}

pub struct FakeNotifier {
    pub toasts: Mutex<Vec<Toast>>,
    pub fail: AtomicBool,
}

impl FakeNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.toasts
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.text.clone())
            .collect()
    }

    pub fn count(&self, text: &str) -> usize {
        self.texts().iter().filter(|t| *t == text).count()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn show(&self, toast: &Toast) -> Result<()> {
        self.toasts.lock().unwrap().push(toast.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Notification("surface gone".to_string()));
        }
        Ok(())
    }
}

/// A controller wired to fakes the test can inspect and steer
pub struct Harness {
    pub controller: EmergencyController,
    pub speech: Arc<FakeSpeech>,
    pub location: Arc<FakeLocation>,
    pub telephony: Arc<FakeTelephony>,
    pub notifier: Arc<FakeNotifier>,
    pub log: CallLog,
}

pub const TEST_POSITION: Position = Position {
    latitude: 12.9716,
    longitude: 77.5946,
};

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let log = CallLog::default();
        let speech = Arc::new(FakeSpeech::new(log.clone()));
        let location = Arc::new(FakeLocation {
            log: log.clone(),
            behavior: Mutex::new(LocationBehavior::Fix(TEST_POSITION)),
            permission: Mutex::new(PermissionState::Granted),
            permission_requests: AtomicU32::new(0),
            last_options: Mutex::new(None),
        });
        let telephony = Arc::new(FakeTelephony {
            log: log.clone(),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        });
        let notifier = Arc::new(FakeNotifier {
            toasts: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        });

        let caps = Capabilities {
            speech: speech.clone(),
            location: location.clone(),
            telephony: telephony.clone(),
            notifier: notifier.clone(),
        };
        let controller = EmergencyController::new(config, caps).expect("valid test config");

        Self {
            controller,
            speech,
            location,
            telephony,
            notifier,
            log,
        }
    }

    pub fn set_location(&self, behavior: LocationBehavior) {
        *self.location.behavior.lock().unwrap() = behavior;
    }
}

/// Let spawned controller tasks run to quiescence
///
/// Under a paused clock the runtime drains every ready task before the
/// sleep's deadline is reached.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
