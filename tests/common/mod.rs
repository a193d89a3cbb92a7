//! Shared test utilities
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use coach_orchestrator::backend::{ConfigBackend, SessionConfigPayload, SessionConfigRequest};
use coach_orchestrator::error::Device;
use coach_orchestrator::media::{MediaDevices, MediaTrack, TrackKind, TrackSource};
use coach_orchestrator::memory::{MemoryExtraction, MemoryExtractionRequest, MemoryGateway};
use coach_orchestrator::realtime::{
    ConnectRequest, Credential, RealtimeConnection, RealtimeEvent, RealtimeService,
    RealtimeSession,
};
use coach_orchestrator::{Config, Error, Result, SessionController, SessionEvent};

/// Config with the default timings
#[must_use]
pub fn test_config() -> Config {
    Config::default()
}

/// How the fake camera behaves
#[derive(Debug, Clone, Copy)]
pub enum CameraMode {
    Allow,
    Deny,
}

/// Counts live tracks and device releases
struct FakeSource {
    live: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl TrackSource for FakeSource {
    fn stop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fake camera and microphone
#[derive(Clone)]
pub struct FakeMedia {
    camera: CameraMode,
    microphone_denied: bool,
    live: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl FakeMedia {
    #[must_use]
    pub fn new(camera: CameraMode) -> Self {
        Self {
            camera,
            microphone_denied: false,
            live: Arc::default(),
            stops: Arc::default(),
        }
    }

    #[must_use]
    pub fn without_microphone(mut self) -> Self {
        self.microphone_denied = true;
        self
    }

    /// Tracks currently held
    #[must_use]
    pub fn live_tracks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Device releases so far
    #[must_use]
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn track(&self, kind: TrackKind, label: &str) -> MediaTrack {
        self.live.fetch_add(1, Ordering::SeqCst);
        MediaTrack::new(
            kind,
            label,
            FakeSource {
                live: Arc::clone(&self.live),
                stops: Arc::clone(&self.stops),
            },
        )
    }
}

#[async_trait]
impl MediaDevices for FakeMedia {
    async fn open_camera(&self) -> Result<MediaTrack> {
        match self.camera {
            CameraMode::Allow => Ok(self.track(TrackKind::Video, "fake-camera")),
            CameraMode::Deny => Err(Error::PermissionDenied(Device::Camera)),
        }
    }

    async fn open_microphone(&self) -> Result<MediaTrack> {
        if self.microphone_denied {
            return Err(Error::PermissionDenied(Device::Microphone));
        }
        Ok(self.track(TrackKind::Audio, "fake-microphone"))
    }
}

/// Fake config backend with optional latency or failure
#[derive(Clone, Default)]
pub struct FakeBackend {
    delay: Option<Duration>,
    memory_summary: Option<String>,
    failing: bool,
}

impl FakeBackend {
    #[must_use]
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Backend that rejects every config request
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_memory(summary: &str) -> Self {
        Self {
            memory_summary: Some(summary.to_string()),
            ..Self::default()
        }
    }

    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ConfigBackend for FakeBackend {
    async fn fetch_session_config(
        &self,
        request: &SessionConfigRequest,
    ) -> Result<SessionConfigPayload> {
        self.wait().await;
        if self.failing {
            return Err(Error::BackendConfig("session config returned 500".to_string()));
        }
        Ok(SessionConfigPayload {
            system_instruction: format!("Coach the user through: {}", request.task_description),
            memory_summary: self.memory_summary.clone(),
        })
    }

    async fn fetch_credential(&self) -> Result<Credential> {
        self.wait().await;
        Ok(Credential::new("test-token"))
    }
}

/// Fake streaming service that records everything sent to the assistant
#[derive(Clone, Default)]
pub struct FakeRealtime {
    connects: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
    instructions: Arc<Mutex<Vec<String>>>,
    video: Arc<Mutex<Option<bool>>>,
    events: Arc<Mutex<Option<mpsc::Sender<RealtimeEvent>>>>,
}

struct FakeConnection {
    disconnects: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl FakeRealtime {
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Texts sent to the assistant so far
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// System instructions of every connection opened
    #[must_use]
    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }

    /// Whether the last connection carried video
    #[must_use]
    pub fn video(&self) -> Option<bool> {
        *self.video.lock().unwrap()
    }

    /// Deliver an event on the current connection
    pub async fn emit(&self, event: RealtimeEvent) {
        let tx = self.events.lock().unwrap().clone().expect("no open connection");
        tx.send(event).await.expect("event pump stopped");
    }

    pub async fn user_says(&self, text: &str) {
        self.emit(RealtimeEvent::Transcript {
            role: coach_orchestrator::transcript::Role::User,
            text: text.to_string(),
        })
        .await;
    }

    pub async fn assistant_says(&self, text: &str) {
        self.emit(RealtimeEvent::Transcript {
            role: coach_orchestrator::transcript::Role::Assistant,
            text: text.to_string(),
        })
        .await;
    }
}

#[async_trait]
impl RealtimeService for FakeRealtime {
    async fn connect(&self, request: ConnectRequest) -> Result<RealtimeSession> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.instructions
            .lock()
            .unwrap()
            .push(request.system_instruction.clone());
        *self.video.lock().unwrap() = Some(request.video.is_some());

        let (tx, rx) = mpsc::channel(64);
        *self.events.lock().unwrap() = Some(tx);

        Ok(RealtimeSession {
            connection: Arc::new(FakeConnection {
                disconnects: Arc::clone(&self.disconnects),
                sent: Arc::clone(&self.sent),
            }),
            events: rx,
        })
    }
}

#[async_trait]
impl RealtimeConnection for FakeConnection {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fake extraction service
#[derive(Clone, Default)]
pub struct FakeMemory {
    requests: Arc<Mutex<Vec<MemoryExtractionRequest>>>,
    failing: bool,
}

impl FakeMemory {
    /// Gateway that records requests but fails every extraction
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn requests(&self) -> Vec<MemoryExtractionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemoryGateway for FakeMemory {
    async fn extract(&self, request: MemoryExtractionRequest) -> Result<MemoryExtraction> {
        self.requests.lock().unwrap().push(request);
        if self.failing {
            return Err(Error::MemorySave("extraction returned 503".to_string()));
        }
        Ok(MemoryExtraction::default())
    }
}

/// Build a controller over the given fakes
#[must_use]
pub fn controller(
    media: &FakeMedia,
    backend: FakeBackend,
    realtime: &FakeRealtime,
) -> SessionController {
    SessionController::builder(
        test_config(),
        Arc::new(media.clone()),
        Arc::new(backend),
        Arc::new(realtime.clone()),
    )
    .build()
}

/// Wait for the first event matching `pred`, skipping the rest
pub async fn wait_for_event<F>(events: &mut broadcast::Receiver<SessionEvent>, pred: F) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    loop {
        match events.recv().await {
            Ok(event) if pred(&event) => return event,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
        }
    }
}

/// Let spawned tasks run without advancing past any real deadline
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
