//! Session lifecycle controller
//!
//! All session state lives in one `Core` behind a short-held mutex that is
//! never held across an await. Background tasks (event pump, countdown,
//! scheduler, observing timer, outbound writer) are spawned on activation
//! and tagged with the session epoch; cleanup bumps the epoch and aborts
//! them, so a stale task can never touch the next session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{
    CompletionCallback, CompletionReason, Message, MessageHistory, SessionEvent, SessionOutcome,
    SessionSnapshot, SessionState, StartOptions,
};
use crate::backend::{ConfigBackend, SessionConfigRequest};
use crate::config::Config;
use crate::media::{self, MediaDevices, MediaTrack, RetryPolicy, TrackInfo};
use crate::memory::{self, MemoryExtractionRequest, MemoryGateway};
use crate::realtime::{
    ConnectRequest, RealtimeConnection, RealtimeEvent, RealtimeService, RealtimeSession,
};
use crate::rewards::{self, RewardEvent, RewardSink};
use crate::scheduler::VirtualMessageScheduler;
use crate::tone::{ResistanceSignal, ToneMachine, ToneState};
use crate::transcript::{Role, TranscriptAggregator, TranscriptEvent, TurnMarker};
use crate::{Error, Result};

/// Outbound message queue capacity
const OUTBOUND_CAPACITY: usize = 64;

/// Session event broadcast capacity
const EVENT_CAPACITY: usize = 64;

/// How long cleanup waits for queued outbound messages to drain
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Everything held for one session
#[derive(Default)]
struct Resources {
    camera: Option<MediaTrack>,
    microphone: Option<MediaTrack>,
    connection: Option<Arc<dyn RealtimeConnection>>,
    outbound: Option<mpsc::Sender<String>>,
    writer: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Resources {
    fn is_empty(&self) -> bool {
        self.camera.is_none()
            && self.microphone.is_none()
            && self.connection.is_none()
            && self.writer.is_none()
            && self.tasks.is_empty()
    }
}

/// Captured when a session is claimed for finalizing
struct Finalization {
    outcome: SessionOutcome,
    callback: Option<CompletionCallback>,
    memory_request: Option<MemoryExtractionRequest>,
}

/// Mutable session state
struct Core {
    state: SessionState,
    task_description: String,
    user_id: String,
    locale: String,
    duration: Duration,
    remaining: Duration,
    started: Option<Instant>,
    camera_enabled: bool,
    observing: bool,
    last_error: Option<String>,
    finalizing: bool,
    on_complete: Option<CompletionCallback>,
    history: MessageHistory,
    tone: ToneMachine,
    scheduler: VirtualMessageScheduler,
    transcript: TranscriptAggregator,
    resources: Resources,
}

impl Core {
    fn new(config: &Config) -> Self {
        Self {
            state: SessionState::Idle,
            task_description: String::new(),
            user_id: config.backend.user_id.clone(),
            locale: config.backend.locale.clone(),
            duration: config.session.duration,
            remaining: Duration::ZERO,
            started: None,
            camera_enabled: false,
            observing: false,
            last_error: None,
            finalizing: false,
            on_complete: None,
            history: MessageHistory::new(),
            tone: ToneMachine::new(config.tone.clone()),
            scheduler: VirtualMessageScheduler::new(config.scheduler.clone()),
            transcript: TranscriptAggregator::new(),
            resources: Resources::default(),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let tone = self.tone.tone();
        SessionSnapshot {
            state: self.state,
            task_description: self.task_description.clone(),
            remaining_secs: self.remaining.as_secs(),
            tone,
            tone_description: tone.description(),
            rejections: self.tone.state().consecutive_rejections,
            camera_enabled: self.camera_enabled,
            observing: self.observing,
            error: self.last_error.clone(),
        }
    }

    /// Queue text for the assistant
    fn send(&self, text: String) {
        match &self.resources.outbound {
            Some(outbound) => {
                if let Err(e) = outbound.try_send(text) {
                    tracing::warn!(error = %e, "outbound queue rejected message");
                }
            }
            None => tracing::debug!("no open connection, outbound message dropped"),
        }
    }
}

struct Inner {
    config: Config,
    media: Arc<dyn MediaDevices>,
    backend: Arc<dyn ConfigBackend>,
    realtime: Arc<dyn RealtimeService>,
    memory: Option<Arc<dyn MemoryGateway>>,
    rewards: Option<Arc<dyn RewardSink>>,
    core: Mutex<Core>,
    /// Serializes `start_session` calls
    start_lock: tokio::sync::Mutex<()>,
    /// Set while a cleanup runs and for a short delay after it
    cleaning: watch::Sender<bool>,
    /// Bumped by every cleanup; work tagged with an older epoch is stale
    epoch: watch::Sender<u64>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl Inner {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn epoch(&self) -> u64 {
        *self.epoch.borrow()
    }

    fn bump_epoch(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
    }

    fn publish(&self, core: &Core) {
        self.snapshots.send_replace(core.snapshot());
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Builder for [`SessionController`]
pub struct SessionControllerBuilder {
    config: Config,
    media: Arc<dyn MediaDevices>,
    backend: Arc<dyn ConfigBackend>,
    realtime: Arc<dyn RealtimeService>,
    memory: Option<Arc<dyn MemoryGateway>>,
    rewards: Option<Arc<dyn RewardSink>>,
}

impl SessionControllerBuilder {
    #[must_use]
    pub fn memory(mut self, gateway: Arc<dyn MemoryGateway>) -> Self {
        self.memory = Some(gateway);
        self
    }

    #[must_use]
    pub fn rewards(mut self, sink: Arc<dyn RewardSink>) -> Self {
        self.rewards = Some(sink);
        self
    }

    #[must_use]
    pub fn build(self) -> SessionController {
        let core = Core::new(&self.config);
        let (snapshots, _) = watch::channel(core.snapshot());
        let (cleaning, _) = watch::channel(false);
        let (epoch, _) = watch::channel(0);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        SessionController {
            inner: Arc::new(Inner {
                config: self.config,
                media: self.media,
                backend: self.backend,
                realtime: self.realtime,
                memory: self.memory,
                rewards: self.rewards,
                core: Mutex::new(core),
                start_lock: tokio::sync::Mutex::new(()),
                cleaning,
                epoch,
                snapshots,
                events,
            }),
        }
    }
}

/// Owns one coaching session at a time
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    #[must_use]
    pub fn builder(
        config: Config,
        media: Arc<dyn MediaDevices>,
        backend: Arc<dyn ConfigBackend>,
        realtime: Arc<dyn RealtimeService>,
    ) -> SessionControllerBuilder {
        SessionControllerBuilder {
            config,
            media,
            backend,
            realtime,
            memory: None,
            rewards: None,
        }
    }

    /// Watch session snapshots
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Receive lifecycle events
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.core().snapshot()
    }

    /// Messages recorded in the current session
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.core().history.messages().to_vec()
    }

    #[must_use]
    pub fn tone_state(&self) -> ToneState {
        self.inner.core().tone.state().clone()
    }

    /// Whether a cleanup is running or cooling down
    #[must_use]
    pub fn is_cleaning_up(&self) -> bool {
        *self.inner.cleaning.borrow()
    }

    /// Start a session for `task_description`
    ///
    /// Tears down any previous session first. On failure every resource
    /// acquired so far is released before the error is returned.
    ///
    /// # Errors
    ///
    /// - `Error::PermissionDenied` / `Error::TransientDevice` if the microphone
    ///   cannot be opened
    /// - `Error::ConnectionTimeout` if config, credential and connection do
    ///   not all complete within the connect timeout
    /// - `Error::BackendConfig` / `Error::Connection` if a service fails
    /// - `Error::Cancelled` if the session is terminated while starting
    pub async fn start_session(&self, task_description: &str, options: StartOptions) -> Result<bool> {
        let _start = self.inner.start_lock.lock().await;
        self.wait_for_cleanup().await;

        let stale = {
            let core = self.inner.core();
            core.state.is_live() || !core.resources.is_empty()
        };
        if stale {
            tracing::info!("previous session still live, cleaning up first");
            self.end_session().await;
            self.wait_for_cleanup().await;
            tokio::time::sleep(self.inner.config.session.start_grace).await;
        }

        let StartOptions {
            user_id,
            locale,
            duration,
            video,
            on_complete,
        } = options;
        let config = &self.inner.config;
        let duration = duration.unwrap_or(config.session.duration);
        let video = video.unwrap_or(config.media.video);

        let epoch = self.inner.epoch();
        {
            let mut core = self.inner.core();
            core.state = SessionState::Connecting;
            core.task_description = task_description.to_string();
            core.user_id = user_id.unwrap_or_else(|| config.backend.user_id.clone());
            core.locale = locale.unwrap_or_else(|| config.backend.locale.clone());
            core.duration = duration;
            core.remaining = duration;
            core.started = None;
            core.camera_enabled = false;
            core.observing = false;
            core.last_error = None;
            core.finalizing = false;
            core.on_complete = on_complete;
            core.history.clear();
            core.tone.reset();
            core.scheduler.stop();
            core.transcript.reset();
            self.inner.publish(&core);
        }
        tracing::info!(task = %task_description, duration_secs = duration.as_secs(), video, "starting session");
        self.inner.emit(SessionEvent::Connecting {
            task_description: task_description.to_string(),
        });

        let connected = tokio::select! {
            biased;
            result = self.connect(epoch, video) => result,
            () = self.cancelled(epoch) => Err(Error::Cancelled),
        };
        let result = match connected {
            Ok(RealtimeSession { connection, events }) => {
                let activated = self.activate(epoch, Arc::clone(&connection), events);
                if activated.is_err()
                    && let Err(e) = connection.disconnect().await
                {
                    tracing::warn!(error = %e, "failed to close connection of cancelled session");
                }
                activated
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::error!(error = %e, "session start failed");
                self.end_session().await;
                {
                    let mut core = self.inner.core();
                    core.last_error = Some(e.to_string());
                    self.inner.publish(&core);
                }
                self.inner.emit(SessionEvent::StartFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Acquire media, fetch config and credential, open the connection
    async fn connect(&self, epoch: u64, video: bool) -> Result<RealtimeSession> {
        let inner = &self.inner;
        let policy = RetryPolicy::from(&inner.config.media);

        let camera = if video {
            media::acquire_camera(inner.media.as_ref(), &policy).await
        } else {
            None
        };
        let video_info = camera.as_ref().map(TrackInfo::from);
        self.install(epoch, move |core| {
            core.camera_enabled = camera.is_some();
            core.resources.camera = camera;
        })?;

        let microphone = media::acquire_microphone(inner.media.as_ref(), &policy).await?;
        let audio_info = TrackInfo::from(&microphone);
        self.install(epoch, move |core| core.resources.microphone = Some(microphone))?;

        let request = {
            let core = inner.core();
            SessionConfigRequest {
                task_description: core.task_description.clone(),
                user_id: core.user_id.clone(),
                locale: core.locale.clone(),
                local_time: chrono::Local::now().format("%Y-%m-%dT%H:%M").to_string(),
            }
        };

        let timeout = inner.config.session.connect_timeout;
        let deadline = Instant::now() + timeout;

        let (payload, credential) = tokio::time::timeout_at(deadline, async {
            tokio::try_join!(
                inner.backend.fetch_session_config(&request),
                inner.backend.fetch_credential()
            )
        })
        .await
        .map_err(|_| Error::ConnectionTimeout(timeout))??;
        self.check_epoch(epoch)?;

        let connect = ConnectRequest {
            credential,
            system_instruction: payload.instruction(),
            audio: audio_info,
            video: video_info,
        };
        tokio::time::timeout_at(deadline, inner.realtime.connect(connect))
            .await
            .map_err(|_| Error::ConnectionTimeout(timeout))?
    }

    /// Store an acquired resource unless the session was terminated meanwhile
    fn install(&self, epoch: u64, store: impl FnOnce(&mut Core)) -> Result<()> {
        let mut core = self.inner.core();
        if self.inner.epoch() != epoch {
            return Err(Error::Cancelled);
        }
        store(&mut *core);
        self.inner.publish(&core);
        Ok(())
    }

    fn check_epoch(&self, epoch: u64) -> Result<()> {
        if self.inner.epoch() == epoch {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }

    /// Resolves once the session tagged `epoch` is terminated
    async fn cancelled(&self, epoch: u64) {
        let mut rx = self.inner.epoch.subscribe();
        let _ = rx.wait_for(|current| *current != epoch).await;
    }

    async fn wait_for_cleanup(&self) {
        let mut rx = self.inner.cleaning.subscribe();
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    fn activate(
        &self,
        epoch: u64,
        connection: Arc<dyn RealtimeConnection>,
        events: mpsc::Receiver<RealtimeEvent>,
    ) -> Result<()> {
        let camera_enabled = {
            let mut core = self.inner.core();
            if self.inner.epoch() != epoch {
                return Err(Error::Cancelled);
            }

            let now = Instant::now();
            let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);

            core.state = SessionState::Active;
            core.started = Some(now);
            core.remaining = core.duration;
            core.observing = true;
            core.scheduler.start(now);
            core.resources.connection = Some(Arc::clone(&connection));
            core.resources.outbound = Some(outbound);
            core.resources.writer = Some(tokio::spawn(write_outbound(connection, outbound_rx)));
            core.resources.tasks = vec![
                tokio::spawn(self.clone().pump(epoch, events)),
                tokio::spawn(self.clone().countdown(epoch)),
                tokio::spawn(self.clone().schedule(epoch)),
                tokio::spawn(self.clone().observe(epoch)),
            ];
            self.inner.publish(&core);
            core.camera_enabled
        };

        tracing::info!(camera_enabled, "session active");
        self.inner.emit(SessionEvent::Active { camera_enabled });
        Ok(())
    }

    async fn pump(self, epoch: u64, mut events: mpsc::Receiver<RealtimeEvent>) {
        while let Some(event) = events.recv().await {
            if self.inner.epoch() != epoch {
                return;
            }
            if let RealtimeEvent::Closed { reason } = event {
                self.connection_lost(reason);
                return;
            }
            self.handle_event(event);
        }
        if self.inner.epoch() == epoch {
            self.connection_lost("event stream ended".to_string());
        }
    }

    fn connection_lost(&self, reason: String) {
        tracing::warn!(reason = %reason, "streaming connection lost");
        self.inner.emit(SessionEvent::ConnectionLost { reason });
        let controller = self.clone();
        drop(tokio::spawn(async move {
            controller.end_session().await;
        }));
    }

    fn handle_event(&self, event: RealtimeEvent) {
        let now = Instant::now();
        let mut core = self.inner.core();
        if core.state != SessionState::Active {
            return;
        }

        match event {
            RealtimeEvent::UserSpeaking(speaking) => {
                core.scheduler.set_user_speaking(speaking);
                if !speaking {
                    core.scheduler.record_user_utterance(now);
                }
            }
            RealtimeEvent::AssistantSpeaking(speaking) => core.scheduler.set_ai_speaking(speaking),
            RealtimeEvent::Transcript { role, text } => {
                if role == Role::User {
                    core.scheduler.record_user_utterance(now);
                }
                for event in core.transcript.push(role, &text) {
                    self.apply_transcript(&mut core, event, now);
                }
            }
            RealtimeEvent::TurnComplete => {
                for event in core.transcript.turn_complete() {
                    self.apply_transcript(&mut core, event, now);
                }
                let from_virtual = core.scheduler.complete_turn(now);
                tracing::debug!(from_virtual, "assistant turn complete");
            }
            RealtimeEvent::Closed { .. } => {}
        }

        self.inner.publish(&core);
    }

    fn apply_transcript(&self, core: &mut Core, event: TranscriptEvent, now: Instant) {
        match event {
            TranscriptEvent::UserMessage(text) => {
                core.history.push(Role::User, text, false);
            }
            TranscriptEvent::AssistantTurnStarted(marker) => {
                core.observing = false;
                if let Some(marker) = marker {
                    self.apply_marker(core, marker, now);
                }
            }
            TranscriptEvent::AssistantMessage(text) => {
                core.history.push(Role::Assistant, text, false);
            }
        }
    }

    /// Single entry point for tone transitions
    fn apply_marker(&self, core: &mut Core, marker: TurnMarker, now: Instant) -> Option<String> {
        let instruction = match marker {
            TurnMarker::Resistance(signal) => core.tone.record_resistance(signal, now),
            TurnMarker::Acceptance => core.tone.record_acceptance(now),
            TurnMarker::ActionStarted => {
                let instruction = core.tone.record_action_started(now);
                if instruction.is_some() {
                    let rejections_overcome = core.tone.state().total_rejections;
                    self.inner
                        .emit(SessionEvent::ActionStarted { rejections_overcome });
                    if let Some(sink) = &self.inner.rewards {
                        rewards::award_in_background(
                            Arc::clone(sink),
                            RewardEvent::ActionStarted {
                                task: core.task_description.clone(),
                                rejections_overcome,
                            },
                        );
                    }
                }
                instruction
            }
        }?;

        self.inner.emit(SessionEvent::ToneChanged {
            tone: core.tone.tone(),
            rejections: core.tone.state().consecutive_rejections,
        });
        core.send(instruction.clone());
        Some(instruction)
    }

    fn apply_external(&self, marker: TurnMarker) -> Option<String> {
        let mut core = self.inner.core();
        if core.state != SessionState::Active {
            return None;
        }
        let instruction = self.apply_marker(&mut core, marker, Instant::now());
        self.inner.publish(&core);
        instruction
    }

    /// Record resistance detected outside the transcript
    ///
    /// Returns the instruction sent to the assistant, if a transition was
    /// committed.
    pub fn record_resistance(&self, signal: ResistanceSignal) -> Option<String> {
        self.apply_external(TurnMarker::Resistance(signal))
    }

    /// Record that the user accepted a suggestion
    pub fn record_acceptance(&self) -> Option<String> {
        self.apply_external(TurnMarker::Acceptance)
    }

    /// Record that the user started the task
    pub fn record_action_started(&self) -> Option<String> {
        self.apply_external(TurnMarker::ActionStarted)
    }

    async fn countdown(self, epoch: u64) {
        let tick = self.inner.config.session.tick;
        let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);

        loop {
            ticker.tick().await;
            if self.inner.epoch() != epoch {
                return;
            }
            let claimed = {
                let mut core = self.inner.core();
                if core.state != SessionState::Active {
                    return;
                }
                core.remaining = core.remaining.saturating_sub(tick);
                if !core.remaining.is_zero() {
                    self.inner.publish(&core);
                    continue;
                }
                tracing::info!("session time is up");
                self.claim_finalize(&mut core, CompletionReason::TimeUp, Instant::now())
            };

            // Finalize tears down this task, so it runs on its own
            if let Some(finalization) = claimed {
                let controller = self.clone();
                drop(tokio::spawn(async move {
                    controller.run_finalize(finalization).await;
                }));
            }
            return;
        }
    }

    async fn schedule(self, epoch: u64) {
        let period = self.inner.config.scheduler.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.inner.epoch() != epoch {
                return;
            }
            self.send_virtual_message();
        }
    }

    fn send_virtual_message(&self) {
        let now = Instant::now();
        let content = {
            let mut core = self.inner.core();
            if core.state != SessionState::Active {
                return;
            }
            let Some(content) = core.scheduler.poll(now) else {
                return;
            };
            core.send(content.clone());
            core.history.push(Role::User, content.clone(), true);
            content
        };

        tracing::debug!(content = %content, "virtual message sent");
        self.inner.emit(SessionEvent::VirtualMessageSent { content });
    }

    async fn observe(self, epoch: u64) {
        tokio::time::sleep(self.inner.config.session.observing_window).await;
        if self.inner.epoch() != epoch {
            return;
        }
        let mut core = self.inner.core();
        if core.observing {
            core.observing = false;
            self.inner.publish(&core);
            tracing::debug!("observing window elapsed");
        }
    }

    /// Finish the session early because the user completed the task
    ///
    /// Returns `false` if there was no active session or it is already
    /// finishing.
    pub async fn complete_session(&self) -> bool {
        self.finalize(CompletionReason::TaskCompleted).await
    }

    /// Persist memory, clean up, then invoke the completion callback
    ///
    /// Runs at most once per session whichever trigger gets here first.
    async fn finalize(&self, reason: CompletionReason) -> bool {
        let claimed = {
            let mut core = self.inner.core();
            self.claim_finalize(&mut core, reason, Instant::now())
        };
        match claimed {
            Some(finalization) => {
                self.run_finalize(finalization).await;
                true
            }
            None => false,
        }
    }

    /// Move an active session to `Finalizing` and capture what teardown needs
    ///
    /// Must run in the same locked section that decided the session is over,
    /// so no other trigger can end it in between.
    fn claim_finalize(
        &self,
        core: &mut Core,
        reason: CompletionReason,
        now: Instant,
    ) -> Option<Finalization> {
        if core.state != SessionState::Active || core.finalizing {
            return None;
        }
        core.finalizing = true;
        core.state = SessionState::Finalizing;

        for event in core.transcript.flush() {
            self.apply_transcript(core, event, now);
        }

        let duration = core
            .started
            .map_or(Duration::ZERO, |started| now.saturating_duration_since(started));
        let rejections_overcome = core.tone.state().total_rejections;
        let completed = reason == CompletionReason::TaskCompleted;

        let celebration = core.tone.completion_celebration();
        core.send(celebration);

        let outcome = SessionOutcome {
            task_description: core.task_description.clone(),
            completed,
            reason,
            duration,
            rejections_overcome,
        };
        let memory_request = MemoryExtractionRequest::from_history(
            core.history.messages(),
            &core.user_id,
            &core.task_description,
            &core.locale,
        )
        .map(|request| request.with_outcome(completed, duration, rejections_overcome));

        self.inner.publish(core);
        Some(Finalization {
            outcome,
            callback: core.on_complete.take(),
            memory_request,
        })
    }

    async fn run_finalize(&self, finalization: Finalization) {
        let Finalization {
            outcome,
            callback,
            memory_request,
        } = finalization;

        tracing::info!(
            reason = ?outcome.reason,
            duration_secs = outcome.duration.as_secs(),
            rejections_overcome = outcome.rejections_overcome,
            "finalizing session"
        );

        match (self.inner.memory.clone(), memory_request) {
            (Some(gateway), Some(request)) => {
                memory::persist_in_background(gateway, request);
                self.inner.emit(SessionEvent::MemorySaveDispatched);
            }
            (Some(_), None) => tracing::debug!("nothing to remember from this session"),
            (None, _) => {}
        }

        self.end_session().await;

        if let Some(sink) = &self.inner.rewards {
            rewards::award_in_background(
                Arc::clone(sink),
                RewardEvent::SessionCompleted {
                    task: outcome.task_description.clone(),
                    duration_secs: outcome.duration.as_secs(),
                    rejections_overcome: outcome.rejections_overcome,
                },
            );
        }
        if let Some(callback) = callback {
            callback(outcome.clone());
        }
        self.inner.emit(SessionEvent::Completed(outcome));
    }

    /// End the current session, waiting for any cleanup already in flight
    pub async fn end_session(&self) {
        if !self.cleanup().await {
            self.wait_for_cleanup().await;
        }
    }

    /// Terminate immediately, e.g. on sign-out
    ///
    /// Media devices are released before the first suspension point. A
    /// `start_session` in flight returns `Error::Cancelled`.
    pub async fn force_terminate(&self) {
        tracing::warn!("forced session termination");
        self.inner.bump_epoch();
        {
            let mut core = self.inner.core();
            if let Some(mut camera) = core.resources.camera.take() {
                camera.stop();
            }
            if let Some(mut microphone) = core.resources.microphone.take() {
                microphone.stop();
            }
            core.camera_enabled = false;
        }
        self.end_session().await;
    }

    /// Release everything held for the current session
    ///
    /// Idempotent: a call made while another cleanup is running (or within
    /// the reset delay after it) returns `false` without touching anything.
    pub async fn cleanup(&self) -> bool {
        let acquired = self.inner.cleaning.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        if !acquired {
            tracing::debug!("cleanup already in progress");
            return false;
        }

        self.inner.bump_epoch();

        let (mut resources, was_live) = {
            let mut core = self.inner.core();
            let was_live = core.state.is_live();
            if was_live {
                core.state = SessionState::Ended;
            }
            core.scheduler.stop();
            core.observing = false;
            core.camera_enabled = false;
            core.on_complete = None;
            let resources = std::mem::take(&mut core.resources);
            self.inner.publish(&core);
            (resources, was_live)
        };

        if let Some(mut camera) = resources.camera.take() {
            camera.stop();
        }
        if let Some(mut microphone) = resources.microphone.take() {
            microphone.stop();
        }
        for task in resources.tasks.drain(..) {
            task.abort();
        }

        drop(resources.outbound.take());
        if let Some(mut writer) = resources.writer.take()
            && tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err()
        {
            tracing::debug!("outbound queue did not drain, dropping remaining messages");
            writer.abort();
        }

        if let Some(connection) = resources.connection.take()
            && let Err(e) = connection.disconnect().await
        {
            tracing::warn!(error = %e, "failed to close streaming connection");
        }

        tracing::info!(was_live, "session cleaned up");
        self.inner.emit(SessionEvent::CleanedUp);

        let inner = Arc::clone(&self.inner);
        let delay = inner.config.session.cleanup_reset_delay;
        drop(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.cleaning.send_replace(false);
        }));
        true
    }
}

async fn write_outbound(connection: Arc<dyn RealtimeConnection>, mut outbound: mpsc::Receiver<String>) {
    while let Some(text) = outbound.recv().await {
        if let Err(e) = connection.send_text(&text).await {
            tracing::warn!(error = %e, "failed to send message to assistant");
        }
    }
}
