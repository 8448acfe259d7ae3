//! Debate orchestration.
//!
//! [`DebateOrchestrator`] owns a [`Session`] and carries out the effects it
//! asks for: clocks, the debater stream, speech capture and playback, and the
//! judge. Everything that happens asynchronously comes back as a
//! [`SessionEvent`] on a single channel, so the session is only ever touched
//! from the orchestrator's own loop.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ai_stream::{Debater, DebaterRequest, StreamOutcome, run_generation};
use crate::config::SessionSettings;
use crate::error::SparringError;
use crate::judge::{Judge, JudgeReport, JudgeRequest};
use crate::message::InputMethod;
use crate::session::{DebateEvent, Effect, Session, SessionEvent, SessionStatus};
use crate::snapshot::SnapshotStore;
use crate::speech::{
    CaptureController, CaptureUpdate, NullPlayback, PlaybackEvent, Recognizer, SpeechPlayback,
    UnsupportedRecognizer,
};
use crate::timer::Ticker;

/// Callback for debate events.
pub type DebateCallback = Box<dyn Fn(DebateEvent) + Send + Sync>;

/// Real-time pacing of the non-turn phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub countdown_tick: Duration,
    pub transition_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            countdown_tick: Duration::from_secs(1),
            transition_delay: Duration::from_millis(2200),
        }
    }
}

impl From<&SessionSettings> for Timings {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            countdown_tick: Duration::from_secs(1),
            transition_delay: Duration::from_millis(settings.transition_delay_ms),
        }
    }
}

/// Cloneable remote control for a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    fn send(&self, event: SessionEvent) -> Result<(), SparringError> {
        self.tx.send(event).map_err(|_| SparringError::SessionClosed)
    }

    pub fn pause(&self) -> Result<(), SparringError> {
        self.send(SessionEvent::Pause)
    }

    pub fn resume(&self) -> Result<(), SparringError> {
        self.send(SessionEvent::Resume)
    }

    pub fn skip(&self) -> Result<(), SparringError> {
        self.send(SessionEvent::Skip)
    }

    /// Submit a typed turn. Blank text is ignored by the session.
    pub fn submit_text(&self, text: impl Into<String>) -> Result<(), SparringError> {
        self.send(SessionEvent::SubmitText(text.into()))
    }

    /// Finish a spoken turn with whatever has been captured so far.
    pub fn submit_voice(&self) -> Result<(), SparringError> {
        self.send(SessionEvent::SubmitVoice)
    }

    /// Keep the unsent typed draft current, so a timeout can commit it.
    pub fn set_draft(&self, text: impl Into<String>) -> Result<(), SparringError> {
        self.send(SessionEvent::TypedDraft(text.into()))
    }

    pub fn set_input_method(&self, method: InputMethod) -> Result<(), SparringError> {
        self.send(SessionEvent::SetInputMethod(method))
    }
}

/// Drives a session against real (or scripted) collaborators.
pub struct DebateOrchestrator {
    session: Session,
    pending: Vec<Effect>,
    debater: Arc<dyn Debater>,
    judge: Arc<dyn Judge>,
    capture: CaptureController,
    playback: Arc<dyn SpeechPlayback>,
    ticker: Ticker,
    generations: HashMap<u64, CancellationToken>,
    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    callback: Option<DebateCallback>,
    store: Option<SnapshotStore>,
    timings: Timings,
}

impl DebateOrchestrator {
    /// Wrap a freshly initialized or restored session together with the
    /// effects that came out of that step.
    pub fn new(
        session: Session,
        initial_effects: Vec<Effect>,
        debater: Arc<dyn Debater>,
        judge: Arc<dyn Judge>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session,
            pending: initial_effects,
            debater,
            judge,
            capture: CaptureController::new(Arc::new(UnsupportedRecognizer)),
            playback: Arc::new(NullPlayback),
            ticker: Ticker::new(),
            generations: HashMap::new(),
            tx,
            rx,
            callback: None,
            store: None,
            timings: Timings::default(),
        }
    }

    /// Set a callback for debate events.
    pub fn with_callback(mut self, callback: DebateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.capture = CaptureController::new(recognizer);
        self
    }

    pub fn with_capture(mut self, capture: CaptureController) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_playback(mut self, playback: Arc<dyn SpeechPlayback>) -> Self {
        self.playback = playback;
        self
    }

    /// Persist the session after every state change, so it can be resumed.
    pub fn with_snapshot_store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle { tx: self.tx.clone() }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the session to completion and return the judge's report.
    pub async fn run(mut self) -> Result<JudgeReport, SparringError> {
        let initial = mem::take(&mut self.pending);
        self.apply(initial);
        self.persist();

        while !self.session.status().is_terminal() {
            // The orchestrator holds a sender itself, so this never yields None.
            let Some(event) = self.rx.recv().await else {
                break;
            };
            let persist = !matches!(
                event,
                SessionEvent::Fragment { .. } | SessionEvent::SpeechInterim(_) | SessionEvent::TypedDraft(_)
            );
            let effects = self.session.handle(event);
            self.apply(effects);
            if persist {
                self.persist();
            }
        }

        self.shutdown();

        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!(error = %e, "failed to clear finished session");
            }
        }

        self.session.report().cloned().ok_or(SparringError::SessionClosed)
    }

    fn shutdown(&mut self) {
        self.ticker.stop();
        self.capture.stop();
        for (_, cancel) in self.generations.drain() {
            cancel.cancel();
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if self.session.status() == SessionStatus::Completed {
            return;
        }
        if let Err(e) = store.save(&self.session.snapshot()) {
            warn!(error = %e, "failed to save session snapshot");
        }
    }

    fn emit(&self, event: DebateEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ScheduleCountdownTick => {
                    self.send_after(self.timings.countdown_tick, SessionEvent::CountdownTick)
                }
                Effect::ScheduleTurnStart { stage_index } => self.send_after(
                    self.timings.transition_delay,
                    SessionEvent::BeginTurn { stage_index },
                ),
                Effect::StartTicker { epoch } => {
                    let tx = self.tx.clone();
                    self.ticker.start(move |elapsed| {
                        let _ = tx.send(SessionEvent::TimerTick { epoch, elapsed });
                    });
                }
                Effect::StopTicker => self.ticker.stop(),
                Effect::StartGeneration {
                    generation,
                    request,
                } => self.start_generation(generation, request),
                Effect::CancelGeneration { generation } => {
                    if let Some(cancel) = self.generations.remove(&generation) {
                        cancel.cancel();
                    }
                }
                Effect::StartCapture => self.start_capture(),
                Effect::StopCapture => self.capture.stop(),
                Effect::Speak {
                    text,
                    voice_id,
                    rate,
                } => {
                    self.playback.speak(
                        &text,
                        voice_id.as_deref(),
                        rate,
                        Box::new(|event| match event {
                            PlaybackEvent::Error(e) => warn!(error = %e, "speech playback failed"),
                            other => debug!(event = ?other, "speech playback"),
                        }),
                    );
                }
                Effect::StopSpeaking => self.playback.stop(),
                Effect::RequestJudgement(request) => self.request_judgement(request),
                Effect::Notify(event) => self.emit(event),
            }
        }
    }

    fn send_after(&self, delay: Duration, event: SessionEvent) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        });
    }

    fn start_generation(&mut self, generation: u64, request: DebaterRequest) {
        let cancel = CancellationToken::new();
        self.generations.insert(generation, cancel.clone());

        let debater = Arc::clone(&self.debater);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let fragments = tx.clone();
            let outcome = run_generation(debater.as_ref(), request, cancel, |text| {
                let _ = fragments.send(SessionEvent::Fragment { generation, text });
            })
            .await;

            let event = match outcome {
                StreamOutcome::Completed => SessionEvent::GenerationFinished { generation },
                StreamOutcome::Failed(e) => SessionEvent::GenerationFailed {
                    generation,
                    reason: e.to_string(),
                },
                StreamOutcome::Cancelled => {
                    debug!(generation, "generation cancelled");
                    return;
                }
            };
            let _ = tx.send(event);
        });
    }

    fn start_capture(&mut self) {
        if !self.capture.is_supported() {
            let _ = self.tx.send(SessionEvent::CaptureUnsupported);
            return;
        }
        let tx = self.tx.clone();
        self.capture.start(move |update| {
            let event = match update {
                CaptureUpdate::Final(text) => SessionEvent::SpeechFinal(text),
                CaptureUpdate::Interim(text) => SessionEvent::SpeechInterim(text),
                CaptureUpdate::Unsupported => SessionEvent::CaptureUnsupported,
                CaptureUpdate::Failed(e) => {
                    warn!(error = %e, "speech capture gave up");
                    SessionEvent::CaptureUnsupported
                }
            };
            let _ = tx.send(event);
        });
    }

    fn request_judgement(&self, request: JudgeRequest) {
        let judge = Arc::clone(&self.judge);
        let tx = self.tx.clone();
        info!(mode = request.mode.as_str(), "requesting judgement");
        tokio::spawn(async move {
            let result = judge.judge(request).await.map_err(|e| e.to_string());
            let _ = tx.send(SessionEvent::JudgeFinished(result));
        });
    }
}
