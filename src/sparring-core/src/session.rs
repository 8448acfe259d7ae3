//! The debate session state machine.
//!
//! [`Session`] is the single writer of all session state. It never performs
//! I/O: every input arrives as a [`SessionEvent`] and every side effect it
//! wants (start a generation, arm the clock, start speech capture, ...) is
//! returned as an [`Effect`] for the driver to carry out. Events that arrive
//! late, for a turn or generation that is already over, are recognised by
//! their tags and dropped.

use std::mem;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::ai_stream::{DebaterRequest, build_history};
use crate::error::SparringError;
use crate::judge::{JudgeReport, JudgeRequest, fallback_report};
use crate::message::{InputMethod, Message};
use crate::snapshot::SessionSnapshot;
use crate::stage_plan::{
    DebateConfig, FirstSpeakerPolicy, Side, Speaker, StageConfig, StageType, build_stage_plan,
    decide_first_speaker,
};
use crate::timer::{Countdown, Threshold, TimerSignal};
use crate::topic::{DebateMode, Difficulty, Stance, Topic};
use crate::transcript::{TranscriptInput, assemble_transcript};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Countdown,
    StageTransition,
    UserTurn,
    AiTurn,
    Paused,
    Scoring,
    Completed,
}

impl SessionStatus {
    pub fn is_turn(self) -> bool {
        matches!(self, SessionStatus::UserTurn | SessionStatus::AiTurn)
    }

    pub fn is_terminal(self) -> bool {
        self == SessionStatus::Completed
    }
}

/// What the human chose when starting a session.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub topic: Topic,
    pub user_stance: Stance,
    pub difficulty: Difficulty,
    pub config: DebateConfig,
    pub mode: DebateMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    pub voice_id: Option<String>,
    pub rate: f32,
}

/// Behaviour knobs that are not part of the debate itself.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub countdown_ticks: u32,
    /// The AI hands a shared stage back to the user only if more than this
    /// many seconds remain.
    pub handoff_min_seconds: u32,
    pub input_method: InputMethod,
    /// Whether speech capture is available at all.
    pub capture_available: bool,
    /// Read finished AI turns aloud when set.
    pub playback: Option<PlaybackSettings>,
    pub first_speaker: FirstSpeakerPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            countdown_ticks: 3,
            handoff_min_seconds: 5,
            input_method: InputMethod::Text,
            capture_available: false,
            playback: None,
            first_speaker: FirstSpeakerPolicy::default(),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// One tick of the pre-start countdown.
    CountdownTick,
    /// The stage announcement is over; start the stage's first turn.
    BeginTurn { stage_index: usize },
    TimerTick { epoch: u64, elapsed: u32 },
    Fragment { generation: u64, text: String },
    GenerationFinished { generation: u64 },
    GenerationFailed { generation: u64, reason: String },
    SpeechFinal(String),
    SpeechInterim(String),
    CaptureUnsupported,
    TypedDraft(String),
    SubmitText(String),
    /// Finalise a spoken turn with whatever has been captured.
    SubmitVoice,
    SetInputMethod(InputMethod),
    Pause,
    Resume,
    Skip,
    JudgeFinished(Result<JudgeReport, String>),
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ScheduleCountdownTick,
    ScheduleTurnStart { stage_index: usize },
    StartTicker { epoch: u64 },
    StopTicker,
    StartGeneration { generation: u64, request: DebaterRequest },
    CancelGeneration { generation: u64 },
    StartCapture,
    StopCapture,
    Speak { text: String, voice_id: Option<String>, rate: f32 },
    StopSpeaking,
    RequestJudgement(JudgeRequest),
    Notify(DebateEvent),
}

/// Notices for whoever presents the session.
#[derive(Debug, Clone, PartialEq)]
pub enum DebateEvent {
    CountdownTick { remaining: u32 },
    StageStarted { index: usize, total: usize, stage: StageConfig },
    TurnStarted { side: Side, stage_type: StageType, time_remaining: u32 },
    TimeRemaining { seconds: u32 },
    TimeWarning(Threshold),
    AiFragment { text: String },
    MessageAdded(Message),
    Paused { from: SessionStatus },
    Resumed { to: SessionStatus },
    GenerationFailed { reason: String },
    InputMethodChanged(InputMethod),
    ScoringStarted,
    DebateEnd { report: JudgeReport },
}

/// Text the user has produced in the current turn but not yet committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDraft {
    pub final_text: String,
    pub interim: String,
    pub typed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnEnd {
    Submitted,
    TimedOut,
    Skipped,
}

/// The live debate aggregate.
#[derive(Debug, Clone)]
pub struct Session {
    topic: Topic,
    user_stance: Stance,
    difficulty: Difficulty,
    config: DebateConfig,
    mode: DebateMode,
    stages: Vec<StageConfig>,
    current_stage_index: usize,
    status: SessionStatus,
    paused_status: Option<SessionStatus>,
    countdown: Countdown,
    countdown_remaining: u32,
    messages: Vec<Message>,
    streaming_text: String,
    draft: UserDraft,
    generation: Option<u64>,
    next_generation: u64,
    ticker_epoch: u64,
    turns_taken: u8,
    ai_turns_taken: u8,
    turn_handled: bool,
    next_message_id: u64,
    report: Option<JudgeReport>,
    options: SessionOptions,
}

impl Session {
    /// Start a session: compute the plan and enter the pre-start countdown.
    pub fn initialize(setup: SessionSetup, options: SessionOptions) -> (Self, Vec<Effect>) {
        let stages = build_stage_plan(setup.mode, setup.user_stance, &setup.config);
        let mut countdown = Countdown::default();
        countdown.arm(stages.first().map_or(0, |s| s.time_limit));

        let session = Self {
            topic: setup.topic,
            user_stance: setup.user_stance,
            difficulty: setup.difficulty,
            config: setup.config,
            mode: setup.mode,
            stages,
            current_stage_index: 0,
            status: SessionStatus::Countdown,
            paused_status: None,
            countdown,
            countdown_remaining: options.countdown_ticks,
            messages: Vec::new(),
            streaming_text: String::new(),
            draft: UserDraft::default(),
            generation: None,
            next_generation: 0,
            ticker_epoch: 0,
            turns_taken: 0,
            ai_turns_taken: 0,
            turn_handled: false,
            next_message_id: 1,
            report: None,
            options,
        };

        info!(
            topic = %session.topic.title,
            stance = %session.user_stance,
            mode = session.mode.as_str(),
            stages = session.stages.len(),
            "session initialized"
        );

        let effects = vec![
            Effect::Notify(DebateEvent::CountdownTick {
                remaining: session.countdown_remaining,
            }),
            Effect::ScheduleCountdownTick,
        ];
        (session, effects)
    }

    /// Feed one event through the state machine.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            SessionEvent::CountdownTick => self.on_countdown_tick(&mut fx),
            SessionEvent::BeginTurn { stage_index } => self.on_begin_turn(stage_index, &mut fx),
            SessionEvent::TimerTick { epoch, elapsed } => self.on_timer_tick(epoch, elapsed, &mut fx),
            SessionEvent::Fragment { generation, text } => self.on_fragment(generation, text, &mut fx),
            SessionEvent::GenerationFinished { generation } => {
                self.on_generation_finished(generation, &mut fx)
            }
            SessionEvent::GenerationFailed { generation, reason } => {
                self.on_generation_failed(generation, reason, &mut fx)
            }
            SessionEvent::SpeechFinal(text) => {
                if self.accepts_user_input() {
                    self.draft.final_text.push_str(&text);
                    self.draft.interim.clear();
                }
            }
            SessionEvent::SpeechInterim(text) => {
                // Pausing folded the interim into the final transcript; a late
                // interim would repeat it.
                if self.status == SessionStatus::UserTurn {
                    self.draft.interim = text;
                }
            }
            SessionEvent::CaptureUnsupported => self.on_capture_unsupported(&mut fx),
            SessionEvent::TypedDraft(text) => {
                if self.accepts_user_input() {
                    self.draft.typed = text;
                }
            }
            SessionEvent::SubmitText(text) => {
                if self.status != SessionStatus::UserTurn || text.trim().is_empty() {
                    debug!(status = ?self.status, "typed submission ignored");
                    return fx;
                }
                self.draft.typed = text;
                self.end_user_turn(TurnEnd::Submitted, InputMethod::Text, &mut fx);
            }
            SessionEvent::SubmitVoice => {
                if self.status != SessionStatus::UserTurn {
                    debug!(status = ?self.status, "voice submission ignored");
                    return fx;
                }
                self.end_user_turn(TurnEnd::Submitted, InputMethod::Voice, &mut fx);
            }
            SessionEvent::SetInputMethod(method) => self.on_set_input_method(method, &mut fx),
            SessionEvent::Pause => self.on_pause(&mut fx),
            SessionEvent::Resume => self.on_resume(&mut fx),
            SessionEvent::Skip => self.on_skip(&mut fx),
            SessionEvent::JudgeFinished(result) => self.on_judge_finished(result, &mut fx),
        }
        fx
    }

    pub fn pause(&mut self) -> Vec<Effect> {
        self.handle(SessionEvent::Pause)
    }

    pub fn resume(&mut self) -> Vec<Effect> {
        self.handle(SessionEvent::Resume)
    }

    pub fn skip(&mut self) -> Vec<Effect> {
        self.handle(SessionEvent::Skip)
    }

    pub fn submit_user_turn(&mut self, text: impl Into<String>) -> Vec<Effect> {
        self.handle(SessionEvent::SubmitText(text.into()))
    }

    /// Transcript in the judge's format.
    pub fn transcript(&self) -> String {
        assemble_transcript(TranscriptInput {
            topic: &self.topic,
            mode: self.mode,
            user_stance: self.user_stance,
            stages: &self.stages,
            messages: &self.messages,
        })
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn paused_status(&self) -> Option<SessionStatus> {
        self.paused_status
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn user_stance(&self) -> Stance {
        self.user_stance
    }

    pub fn mode(&self) -> DebateMode {
        self.mode
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    pub fn stages(&self) -> &[StageConfig] {
        &self.stages
    }

    pub fn current_stage_index(&self) -> usize {
        self.current_stage_index
    }

    pub fn current_stage(&self) -> &StageConfig {
        &self.stages[self.current_stage_index]
    }

    pub fn time_remaining(&self) -> u32 {
        self.countdown.remaining()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn streaming_text(&self) -> &str {
        &self.streaming_text
    }

    pub fn draft(&self) -> &UserDraft {
        &self.draft
    }

    pub fn is_generating(&self) -> bool {
        self.generation.is_some()
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.generation
    }

    pub fn ticker_epoch(&self) -> u64 {
        self.ticker_epoch
    }

    pub fn input_method(&self) -> InputMethod {
        self.options.input_method
    }

    pub fn report(&self) -> Option<&JudgeReport> {
        self.report.as_ref()
    }

    fn accepts_user_input(&self) -> bool {
        self.status == SessionStatus::UserTurn
            || (self.status == SessionStatus::Paused
                && self.paused_status == Some(SessionStatus::UserTurn))
    }

    fn capture_wanted(&self) -> bool {
        self.options.input_method == InputMethod::Voice && self.options.capture_available
    }

    fn notify(fx: &mut Vec<Effect>, event: DebateEvent) {
        fx.push(Effect::Notify(event));
    }

    fn on_countdown_tick(&mut self, fx: &mut Vec<Effect>) {
        if self.status != SessionStatus::Countdown {
            return;
        }
        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        Self::notify(
            fx,
            DebateEvent::CountdownTick {
                remaining: self.countdown_remaining,
            },
        );
        if self.countdown_remaining == 0 {
            self.enter_stage_transition(fx);
        } else {
            fx.push(Effect::ScheduleCountdownTick);
        }
    }

    fn enter_stage_transition(&mut self, fx: &mut Vec<Effect>) {
        self.status = SessionStatus::StageTransition;
        self.turns_taken = 0;
        self.ai_turns_taken = 0;
        info!(
            index = self.current_stage_index,
            stage = self.current_stage().stage_type.as_str(),
            "stage transition"
        );
        Self::notify(
            fx,
            DebateEvent::StageStarted {
                index: self.current_stage_index,
                total: self.stages.len(),
                stage: self.current_stage().clone(),
            },
        );
        fx.push(Effect::ScheduleTurnStart {
            stage_index: self.current_stage_index,
        });
    }

    fn on_begin_turn(&mut self, stage_index: usize, fx: &mut Vec<Effect>) {
        if self.status != SessionStatus::StageTransition || stage_index != self.current_stage_index {
            debug!(stage_index, status = ?self.status, "stale turn start ignored");
            return;
        }
        let first = decide_first_speaker(
            self.current_stage(),
            self.user_stance,
            &self.options.first_speaker,
        );
        self.start_ticker(fx);
        match first {
            Side::User => self.enter_user_turn(fx),
            Side::Ai => self.enter_ai_turn(fx),
        }
    }

    fn start_ticker(&mut self, fx: &mut Vec<Effect>) {
        self.ticker_epoch += 1;
        fx.push(Effect::StartTicker {
            epoch: self.ticker_epoch,
        });
    }

    fn stop_ticker(&mut self, fx: &mut Vec<Effect>) {
        // Bumping the epoch makes any tick already in flight stale.
        self.ticker_epoch += 1;
        fx.push(Effect::StopTicker);
    }

    fn announce_turn(&self, side: Side, fx: &mut Vec<Effect>) {
        Self::notify(
            fx,
            DebateEvent::TurnStarted {
                side,
                stage_type: self.current_stage().stage_type,
                time_remaining: self.countdown.remaining(),
            },
        );
    }

    fn enter_user_turn(&mut self, fx: &mut Vec<Effect>) {
        self.status = SessionStatus::UserTurn;
        self.turn_handled = false;
        self.announce_turn(Side::User, fx);
        if self.capture_wanted() {
            fx.push(Effect::StartCapture);
        }
    }

    fn enter_ai_turn(&mut self, fx: &mut Vec<Effect>) {
        self.status = SessionStatus::AiTurn;
        self.turn_handled = false;
        self.announce_turn(Side::Ai, fx);
        self.start_generation(fx);
    }

    fn start_generation(&mut self, fx: &mut Vec<Effect>) {
        // At most one generation in flight.
        self.cancel_generation(fx);

        self.next_generation += 1;
        let generation = self.next_generation;
        self.generation = Some(generation);

        let request = DebaterRequest {
            topic: self.topic.clone(),
            ai_stance: self.user_stance.opposite(),
            difficulty: self.difficulty,
            stage: self.current_stage().clone(),
            history: build_history(&self.messages),
        };
        debug!(generation, history = request.history.len(), "starting generation");
        fx.push(Effect::StartGeneration {
            generation,
            request,
        });
    }

    /// Cancel the in-flight generation, if any, keeping what it produced.
    fn cancel_generation(&mut self, fx: &mut Vec<Effect>) {
        if let Some(generation) = self.generation.take() {
            debug!(generation, "cancelling generation");
            fx.push(Effect::CancelGeneration { generation });
        }
        self.flush_streaming(fx);
    }

    /// Move the streaming buffer into the log. Returns the committed text.
    fn flush_streaming(&mut self, fx: &mut Vec<Effect>) -> Option<String> {
        let text = mem::take(&mut self.streaming_text);
        let content = text.trim();
        if content.is_empty() {
            return None;
        }
        self.append_message(Side::Ai, content.to_string(), InputMethod::Text, fx);
        Some(content.to_string())
    }

    fn append_message(
        &mut self,
        speaker: Side,
        content: String,
        input_method: InputMethod,
        fx: &mut Vec<Effect>,
    ) {
        let message = Message {
            id: self.next_message_id,
            speaker,
            content,
            timestamp: Utc::now(),
            stage_type: self.current_stage().stage_type,
            input_method,
        };
        self.next_message_id += 1;
        self.messages.push(message.clone());
        Self::notify(fx, DebateEvent::MessageAdded(message));
    }

    fn on_timer_tick(&mut self, epoch: u64, elapsed: u32, fx: &mut Vec<Effect>) {
        if epoch != self.ticker_epoch || !self.status.is_turn() {
            trace!(epoch, current = self.ticker_epoch, "stale timer tick ignored");
            return;
        }
        for signal in self.countdown.tick(elapsed) {
            match signal {
                TimerSignal::Tick { remaining } => {
                    Self::notify(fx, DebateEvent::TimeRemaining { seconds: remaining })
                }
                TimerSignal::Warning(threshold) => {
                    Self::notify(fx, DebateEvent::TimeWarning(threshold))
                }
                TimerSignal::Timeout => self.on_timeout(fx),
            }
        }
    }

    fn on_timeout(&mut self, fx: &mut Vec<Effect>) {
        info!(status = ?self.status, "turn timed out");
        match self.status {
            SessionStatus::UserTurn => {
                let method = self.options.input_method;
                self.end_user_turn(TurnEnd::TimedOut, method, fx);
            }
            SessionStatus::AiTurn => self.end_ai_turn_early(fx),
            _ => {}
        }
    }

    fn end_user_turn(&mut self, reason: TurnEnd, method: InputMethod, fx: &mut Vec<Effect>) {
        fx.push(Effect::StopCapture);

        let draft = mem::take(&mut self.draft);
        let captured = match method {
            InputMethod::Voice => format!("{}{}", draft.final_text, draft.interim),
            InputMethod::Text => draft.typed,
        };
        let content = captured.trim();
        if !content.is_empty() {
            self.append_message(Side::User, content.to_string(), method, fx);
        }

        self.turns_taken += 1;
        debug!(?reason, turns = self.turns_taken, "user turn ended");

        let shared = self.current_stage().speaker == Speaker::Both;
        if reason == TurnEnd::Submitted && shared && self.turns_taken == 1 {
            self.enter_ai_turn(fx);
        } else {
            self.advance_stage(fx);
        }
    }

    /// Timeout or skip of an AI turn: keep the partial output and move on.
    fn end_ai_turn_early(&mut self, fx: &mut Vec<Effect>) {
        self.cancel_generation(fx);
        self.turns_taken += 1;
        self.ai_turns_taken += 1;
        self.advance_stage(fx);
    }

    fn on_fragment(&mut self, generation: u64, text: String, fx: &mut Vec<Effect>) {
        if self.status != SessionStatus::AiTurn || self.generation != Some(generation) {
            trace!(generation, "fragment from inactive generation dropped");
            return;
        }
        self.streaming_text.push_str(&text);
        Self::notify(fx, DebateEvent::AiFragment { text });
    }

    fn on_generation_finished(&mut self, generation: u64, fx: &mut Vec<Effect>) {
        if self.status != SessionStatus::AiTurn || self.generation != Some(generation) {
            return;
        }
        self.generation = None;

        if let Some(text) = self.flush_streaming(fx) {
            if let Some(playback) = &self.options.playback {
                fx.push(Effect::Speak {
                    text,
                    voice_id: playback.voice_id.clone(),
                    rate: playback.rate,
                });
            }
        }

        self.turns_taken += 1;
        self.ai_turns_taken += 1;
        let shared = self.current_stage().speaker == Speaker::Both;
        if shared
            && self.ai_turns_taken == 1
            && self.countdown.remaining() > self.options.handoff_min_seconds
        {
            self.enter_user_turn(fx);
        } else {
            self.advance_stage(fx);
        }
    }

    fn on_generation_failed(&mut self, generation: u64, reason: String, fx: &mut Vec<Effect>) {
        if self.status != SessionStatus::AiTurn || self.generation != Some(generation) {
            return;
        }
        warn!(generation, %reason, "AI generation failed");
        self.generation = None;
        self.flush_streaming(fx);
        self.append_message(
            Side::Ai,
            format!("[AI response failed: {}]", reason),
            InputMethod::Text,
            fx,
        );
        Self::notify(fx, DebateEvent::GenerationFailed { reason });
        self.turns_taken += 1;
        self.ai_turns_taken += 1;
        self.advance_stage(fx);
    }

    fn on_capture_unsupported(&mut self, fx: &mut Vec<Effect>) {
        if !self.options.capture_available && self.options.input_method == InputMethod::Text {
            return;
        }
        warn!("speech capture unavailable, falling back to text input");
        self.options.capture_available = false;
        if self.options.input_method == InputMethod::Voice {
            self.options.input_method = InputMethod::Text;
            Self::notify(fx, DebateEvent::InputMethodChanged(InputMethod::Text));
        }
    }

    fn on_set_input_method(&mut self, method: InputMethod, fx: &mut Vec<Effect>) {
        if method == self.options.input_method || self.status.is_terminal() {
            return;
        }
        if method == InputMethod::Voice && !self.options.capture_available {
            warn!("voice input requested but speech capture is unavailable");
            return;
        }
        self.options.input_method = method;
        Self::notify(fx, DebateEvent::InputMethodChanged(method));

        if self.status == SessionStatus::UserTurn {
            match method {
                InputMethod::Voice => fx.push(Effect::StartCapture),
                InputMethod::Text => fx.push(Effect::StopCapture),
            }
        }
    }

    fn on_pause(&mut self, fx: &mut Vec<Effect>) {
        if !self.status.is_turn() {
            debug!(status = ?self.status, "pause ignored");
            return;
        }
        let from = self.status;
        self.stop_ticker(fx);
        fx.push(Effect::StopSpeaking);

        match from {
            SessionStatus::AiTurn => self.cancel_generation(fx),
            _ => {
                fx.push(Effect::StopCapture);
                // Capture restarts from scratch on resume; keep what was heard.
                let interim = mem::take(&mut self.draft.interim);
                self.draft.final_text.push_str(&interim);
            }
        }

        self.paused_status = Some(from);
        self.status = SessionStatus::Paused;
        info!(?from, "session paused");
        Self::notify(fx, DebateEvent::Paused { from });
    }

    fn on_resume(&mut self, fx: &mut Vec<Effect>) {
        if self.status != SessionStatus::Paused {
            debug!(status = ?self.status, "resume ignored, session is not paused");
            return;
        }
        let to = self.paused_status.take().unwrap_or(SessionStatus::UserTurn);
        self.status = to;
        info!(?to, "session resumed");
        Self::notify(fx, DebateEvent::Resumed { to });

        self.start_ticker(fx);
        match to {
            SessionStatus::AiTurn => self.start_generation(fx),
            _ => {
                if self.capture_wanted() {
                    fx.push(Effect::StartCapture);
                }
            }
        }
    }

    fn on_skip(&mut self, fx: &mut Vec<Effect>) {
        match self.status {
            SessionStatus::UserTurn => {
                fx.push(Effect::StopSpeaking);
                let method = self.options.input_method;
                self.end_user_turn(TurnEnd::Skipped, method, fx);
            }
            SessionStatus::AiTurn => {
                fx.push(Effect::StopSpeaking);
                self.end_ai_turn_early(fx);
            }
            status => debug!(?status, "skip ignored"),
        }
    }

    /// Move to the next stage, or to scoring after the last one.
    ///
    /// Runs at most once per turn, whichever of submit, timeout, skip or
    /// generation end gets here first.
    fn advance_stage(&mut self, fx: &mut Vec<Effect>) {
        if self.turn_handled {
            debug!("stage advance already handled for this turn");
            return;
        }
        self.turn_handled = true;

        self.stop_ticker(fx);
        fx.push(Effect::StopCapture);
        self.cancel_generation(fx);
        self.draft = UserDraft::default();

        let next = self.current_stage_index + 1;
        if next < self.stages.len() {
            self.current_stage_index = next;
            self.countdown.arm(self.stages[next].time_limit);
            self.enter_stage_transition(fx);
        } else {
            self.countdown.disarm();
            self.status = SessionStatus::Scoring;
            info!(messages = self.messages.len(), "debate finished, scoring");
            Self::notify(fx, DebateEvent::ScoringStarted);
            fx.push(Effect::RequestJudgement(self.judge_request()));
        }
    }

    fn judge_request(&self) -> JudgeRequest {
        JudgeRequest {
            transcript: self.transcript(),
            topic: self.topic.clone(),
            mode: self.mode,
        }
    }

    fn on_judge_finished(&mut self, result: Result<JudgeReport, String>, fx: &mut Vec<Effect>) {
        if self.status != SessionStatus::Scoring {
            return;
        }
        let report = match result {
            Ok(report) if report.mode() == self.mode => report,
            Ok(report) => {
                let reason = format!(
                    "judge returned a {} report for a {} debate",
                    report.mode().as_str(),
                    self.mode.as_str()
                );
                warn!(%reason, "using fallback report");
                fallback_report(self.mode, &reason)
            }
            Err(reason) => {
                warn!(%reason, "judging failed, using fallback report");
                fallback_report(self.mode, &reason)
            }
        };

        self.report = Some(report.clone());
        self.status = SessionStatus::Completed;
        info!(winner = ?report.winner, fallback = report.fallback, "session completed");
        Self::notify(fx, DebateEvent::DebateEnd { report });
    }

    /// Capture the aggregate for persistence.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            topic: self.topic.clone(),
            user_stance: self.user_stance,
            difficulty: self.difficulty,
            config: self.config,
            mode: self.mode,
            stages: self.stages.clone(),
            current_stage_index: self.current_stage_index,
            status: self.status,
            paused_status: self.paused_status,
            countdown: self.countdown.clone(),
            countdown_remaining: self.countdown_remaining,
            messages: self.messages.clone(),
            streaming_text: self.streaming_text.clone(),
            draft: self.draft.clone(),
            turns_taken: self.turns_taken,
            ai_turns_taken: self.ai_turns_taken,
            turn_handled: self.turn_handled,
            next_message_id: self.next_message_id,
            report: self.report.clone(),
        }
    }

    /// Rebuild a session from a snapshot.
    ///
    /// Nothing that was in flight survives a restart: an active turn comes back
    /// paused, and a partially streamed AI turn is committed to the log. The
    /// returned effects pick the flow back up from the restored state.
    ///
    /// A snapshot whose stage plan is empty or whose stage index is out of
    /// range is rejected.
    pub fn restore(
        snapshot: SessionSnapshot,
        options: SessionOptions,
    ) -> Result<(Self, Vec<Effect>), SparringError> {
        if snapshot.stages.is_empty() {
            return Err(SparringError::SnapshotError(
                "snapshot has no stages".to_string(),
            ));
        }
        let current_stage_index = snapshot.current_stage_index;
        if current_stage_index >= snapshot.stages.len() {
            return Err(SparringError::SnapshotError(format!(
                "snapshot stage index {} is out of range for {} stages",
                current_stage_index,
                snapshot.stages.len()
            )));
        }

        let mut session = Self {
            topic: snapshot.topic,
            user_stance: snapshot.user_stance,
            difficulty: snapshot.difficulty,
            config: snapshot.config,
            mode: snapshot.mode,
            stages: snapshot.stages,
            current_stage_index,
            status: snapshot.status,
            paused_status: snapshot.paused_status,
            countdown: snapshot.countdown,
            countdown_remaining: snapshot.countdown_remaining,
            messages: snapshot.messages,
            streaming_text: snapshot.streaming_text,
            draft: snapshot.draft,
            generation: None,
            next_generation: 0,
            ticker_epoch: 0,
            turns_taken: snapshot.turns_taken,
            ai_turns_taken: snapshot.ai_turns_taken,
            turn_handled: snapshot.turn_handled,
            next_message_id: snapshot.next_message_id,
            report: snapshot.report,
            options,
        };

        let mut fx = Vec::new();
        session.flush_streaming(&mut fx);

        match session.status {
            SessionStatus::Idle | SessionStatus::Countdown => {
                session.status = SessionStatus::Countdown;
                Self::notify(
                    &mut fx,
                    DebateEvent::CountdownTick {
                        remaining: session.countdown_remaining,
                    },
                );
                fx.push(Effect::ScheduleCountdownTick);
            }
            SessionStatus::StageTransition => session.enter_stage_transition(&mut fx),
            SessionStatus::UserTurn | SessionStatus::AiTurn => {
                let from = session.status;
                session.paused_status = Some(from);
                session.status = SessionStatus::Paused;
                Self::notify(&mut fx, DebateEvent::Paused { from });
            }
            SessionStatus::Paused => {
                let from = session.paused_status.unwrap_or(SessionStatus::UserTurn);
                Self::notify(&mut fx, DebateEvent::Paused { from });
            }
            SessionStatus::Scoring => {
                Self::notify(&mut fx, DebateEvent::ScoringStarted);
                fx.push(Effect::RequestJudgement(session.judge_request()));
            }
            SessionStatus::Completed => {}
        }

        info!(status = ?session.status, messages = session.messages.len(), "session restored");
        Ok((session, fx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::Winner;

    fn setup(mode: DebateMode, stance: Stance) -> SessionSetup {
        SessionSetup {
            topic: Topic::new("t1", "Social media does more harm than good", "Harm", "Good"),
            user_stance: stance,
            difficulty: Difficulty::Intermediate,
            config: DebateConfig {
                opening: 60,
                cross_exam: 40,
                free_debate: 30,
                closing: 30,
                prep: 5,
                emotional_total: 120,
            },
            mode,
        }
    }

    fn voice_options() -> SessionOptions {
        SessionOptions {
            input_method: InputMethod::Voice,
            capture_available: true,
            ..SessionOptions::default()
        }
    }

    fn start(mode: DebateMode, stance: Stance, options: SessionOptions) -> Session {
        let (mut session, _) = Session::initialize(setup(mode, stance), options);
        for _ in 0..3 {
            session.handle(SessionEvent::CountdownTick);
        }
        assert_eq!(session.status(), SessionStatus::StageTransition);
        session.handle(SessionEvent::BeginTurn { stage_index: 0 });
        session
    }

    fn begin_current_stage(session: &mut Session) -> Vec<Effect> {
        let stage_index = session.current_stage_index();
        session.handle(SessionEvent::BeginTurn { stage_index })
    }

    fn tick(session: &mut Session, elapsed: u32) -> Vec<Effect> {
        let epoch = session.ticker_epoch();
        session.handle(SessionEvent::TimerTick { epoch, elapsed })
    }

    fn stream(session: &mut Session, text: &str) {
        let generation = session.active_generation().expect("generation in flight");
        session.handle(SessionEvent::Fragment {
            generation,
            text: text.to_string(),
        });
    }

    fn finish(session: &mut Session) -> Vec<Effect> {
        let generation = session.active_generation().expect("generation in flight");
        session.handle(SessionEvent::GenerationFinished { generation })
    }

    fn has(effects: &[Effect], pred: impl Fn(&Effect) -> bool) -> bool {
        effects.iter().any(pred)
    }

    #[test]
    fn test_initialize_enters_countdown_with_first_stage_time() {
        let (session, effects) =
            Session::initialize(setup(DebateMode::Standard, Stance::Pro), SessionOptions::default());
        assert_eq!(session.status(), SessionStatus::Countdown);
        assert_eq!(session.stages().len(), 7);
        assert_eq!(session.current_stage_index(), 0);
        assert_eq!(session.time_remaining(), 60);
        assert!(effects.contains(&Effect::ScheduleCountdownTick));
    }

    #[test]
    fn test_countdown_takes_three_ticks() {
        let (mut session, _) =
            Session::initialize(setup(DebateMode::Standard, Stance::Pro), SessionOptions::default());
        assert!(session.handle(SessionEvent::CountdownTick).contains(&Effect::ScheduleCountdownTick));
        session.handle(SessionEvent::CountdownTick);
        assert_eq!(session.status(), SessionStatus::Countdown);
        let effects = session.handle(SessionEvent::CountdownTick);
        assert_eq!(session.status(), SessionStatus::StageTransition);
        assert!(effects.contains(&Effect::ScheduleTurnStart { stage_index: 0 }));
    }

    #[test]
    fn test_single_speaker_stage_user_then_advance() {
        let mut session = start(DebateMode::Standard, Stance::Pro, SessionOptions::default());
        assert_eq!(session.status(), SessionStatus::UserTurn);

        session.submit_user_turn("  My opening.  ");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "My opening.");
        assert_eq!(session.messages()[0].stage_type, StageType::OpeningPro);
        assert_eq!(session.status(), SessionStatus::StageTransition);
        assert_eq!(session.current_stage_index(), 1);
        assert_eq!(session.time_remaining(), 60);
    }

    #[test]
    fn test_single_speaker_stage_ai_then_advance() {
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        assert_eq!(session.status(), SessionStatus::AiTurn);
        assert!(session.is_generating());

        stream(&mut session, "Pro ");
        stream(&mut session, "opens.");
        assert_eq!(session.streaming_text(), "Pro opens.");
        finish(&mut session);

        assert_eq!(session.streaming_text(), "");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].speaker, Side::Ai);
        assert_eq!(session.current_stage_index(), 1);
        assert_eq!(session.status(), SessionStatus::StageTransition);
    }

    #[test]
    fn test_blank_typed_submission_keeps_turn_open() {
        let mut session = start(DebateMode::Standard, Stance::Pro, SessionOptions::default());
        assert!(session.submit_user_turn("   ").is_empty());
        assert_eq!(session.status(), SessionStatus::UserTurn);
    }

    #[test]
    fn test_both_stage_user_first_hands_to_ai_and_back() {
        let mut session = start(DebateMode::Emotional, Stance::Con, SessionOptions::default());
        assert_eq!(session.status(), SessionStatus::UserTurn);

        let effects = session.submit_user_turn("You are wrong!");
        assert_eq!(session.status(), SessionStatus::AiTurn);
        assert!(has(&effects, |e| matches!(e, Effect::StartGeneration { .. })));

        stream(&mut session, "No, you are.");
        finish(&mut session);
        assert_eq!(session.status(), SessionStatus::UserTurn);
        assert_eq!(session.current_stage_index(), 0);

        session.submit_user_turn("Closing thought.");
        assert_eq!(session.status(), SessionStatus::Scoring);
        assert_eq!(session.messages().len(), 3);
    }

    #[test]
    fn test_both_stage_ai_reply_with_little_time_advances() {
        let mut session = start(DebateMode::Emotional, Stance::Pro, SessionOptions::default());
        session.submit_user_turn("Opening salvo.");
        tick(&mut session, 115);
        assert_eq!(session.time_remaining(), 5);

        stream(&mut session, "Reply.");
        let effects = finish(&mut session);
        assert_eq!(session.status(), SessionStatus::Scoring);
        assert!(has(&effects, |e| matches!(e, Effect::RequestJudgement(_))));
    }

    #[test]
    fn test_both_stage_ai_first_then_user_then_advance() {
        // cross_pro with a con user: the AI (pro) asks first.
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        stream(&mut session, "Opening.");
        finish(&mut session);
        begin_current_stage(&mut session);
        session.submit_user_turn("Con opening.");
        begin_current_stage(&mut session);

        assert_eq!(session.current_stage().stage_type, StageType::CrossPro);
        assert_eq!(session.status(), SessionStatus::AiTurn);
        stream(&mut session, "Question?");
        finish(&mut session);
        assert_eq!(session.status(), SessionStatus::UserTurn);

        session.submit_user_turn("Answer.");
        assert_eq!(session.status(), SessionStatus::StageTransition);
        assert_eq!(session.current_stage().stage_type, StageType::CrossCon);
    }

    #[test]
    fn test_pause_during_ai_turn_flushes_buffer() {
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        let generation = session.active_generation().unwrap();
        stream(&mut session, "Half a thought");

        let effects = session.pause();
        assert_eq!(session.status(), SessionStatus::Paused);
        assert_eq!(session.paused_status(), Some(SessionStatus::AiTurn));
        assert_eq!(session.streaming_text(), "");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "Half a thought");
        assert!(!session.is_generating());
        assert!(effects.contains(&Effect::CancelGeneration { generation }));
        assert!(effects.contains(&Effect::StopTicker));

        // A fragment that was already on its way is dropped.
        session.handle(SessionEvent::Fragment {
            generation,
            text: "late".into(),
        });
        assert_eq!(session.streaming_text(), "");
    }

    #[test]
    fn test_resume_restores_ai_turn_and_regenerates_with_continuation() {
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        stream(&mut session, "Half");
        session.pause();

        let effects = session.resume();
        assert_eq!(session.status(), SessionStatus::AiTurn);
        assert_eq!(session.paused_status(), None);
        let request = effects
            .iter()
            .find_map(|e| match e {
                Effect::StartGeneration { request, .. } => Some(request.clone()),
                _ => None,
            })
            .expect("generation restarted");
        assert_eq!(request.history.len(), 2);
        assert_eq!(request.history[1].content, crate::prompt::CONTINUATION_INSTRUCTION);
        assert!(has(&effects, |e| matches!(e, Effect::StartTicker { .. })));
    }

    #[test]
    fn test_resume_twice_is_noop() {
        let mut session = start(DebateMode::Standard, Stance::Pro, SessionOptions::default());
        session.pause();
        session.resume();
        assert_eq!(session.status(), SessionStatus::UserTurn);
        assert!(session.resume().is_empty());
        assert_eq!(session.status(), SessionStatus::UserTurn);
    }

    #[test]
    fn test_pause_outside_turn_is_ignored() {
        let (mut session, _) =
            Session::initialize(setup(DebateMode::Standard, Stance::Pro), SessionOptions::default());
        assert!(session.pause().is_empty());
        assert_eq!(session.status(), SessionStatus::Countdown);
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut session = start(DebateMode::Standard, Stance::Pro, SessionOptions::default());
        tick(&mut session, 10);
        let stale_epoch = session.ticker_epoch();
        session.pause();
        session.handle(SessionEvent::TimerTick {
            epoch: stale_epoch,
            elapsed: 5,
        });
        assert_eq!(session.time_remaining(), 50);
        session.resume();
        tick(&mut session, 1);
        assert_eq!(session.time_remaining(), 49);
    }

    #[test]
    fn test_timeout_captures_interim_transcript() {
        let mut session = start(DebateMode::Standard, Stance::Pro, voice_options());
        session.handle(SessionEvent::SpeechInterim("today we".into()));
        tick(&mut session, 60);

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "today we");
        assert_eq!(session.messages()[0].input_method, InputMethod::Voice);
        assert_eq!(session.current_stage_index(), 1);
        assert_eq!(session.status(), SessionStatus::StageTransition);
    }

    #[test]
    fn test_timeout_with_blank_interim_adds_nothing_and_advances_once() {
        let mut session = start(DebateMode::Standard, Stance::Pro, voice_options());
        session.handle(SessionEvent::SpeechInterim("   ".into()));
        tick(&mut session, 60);
        assert!(session.messages().is_empty());
        assert_eq!(session.current_stage_index(), 1);

        // A submit racing the timeout does not advance again.
        session.handle(SessionEvent::SubmitVoice);
        assert_eq!(session.current_stage_index(), 1);
        assert_eq!(session.status(), SessionStatus::StageTransition);
    }

    #[test]
    fn test_voice_submission_joins_final_and_interim() {
        let mut session = start(DebateMode::Standard, Stance::Pro, voice_options());
        session.handle(SessionEvent::SpeechFinal("First part. ".into()));
        session.handle(SessionEvent::SpeechInterim("second".into()));
        session.handle(SessionEvent::SubmitVoice);
        assert_eq!(session.messages()[0].content, "First part. second");
    }

    #[test]
    fn test_pause_keeps_interim_speech() {
        let mut session = start(DebateMode::Standard, Stance::Pro, voice_options());
        session.handle(SessionEvent::SpeechInterim("half heard".into()));
        let effects = session.pause();
        assert!(effects.contains(&Effect::StopCapture));
        assert_eq!(session.draft().final_text, "half heard");

        let effects = session.resume();
        assert!(effects.contains(&Effect::StartCapture));
        session.handle(SessionEvent::SubmitVoice);
        assert_eq!(session.messages()[0].content, "half heard");
    }

    #[test]
    fn test_interim_arriving_while_paused_is_not_repeated() {
        let mut session = start(DebateMode::Standard, Stance::Pro, voice_options());
        session.handle(SessionEvent::SpeechInterim("half heard".into()));
        session.pause();
        session.handle(SessionEvent::SpeechInterim("half heard more".into()));
        assert_eq!(session.draft().interim, "");

        session.resume();
        session.handle(SessionEvent::SpeechFinal(" and the rest".into()));
        session.handle(SessionEvent::SubmitVoice);
        assert_eq!(session.messages()[0].content, "half heard and the rest");
    }

    #[test]
    fn test_timeout_during_ai_turn_keeps_partial_output() {
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        let generation = session.active_generation().unwrap();
        stream(&mut session, "Partial argument");
        let effects = tick(&mut session, 60);

        assert!(effects.contains(&Effect::CancelGeneration { generation }));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "Partial argument");
        assert_eq!(session.current_stage_index(), 1);

        // Completion arriving after the cancel changes nothing.
        session.handle(SessionEvent::GenerationFinished { generation });
        assert_eq!(session.current_stage_index(), 1);
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_warnings_are_notified() {
        let mut session = start(DebateMode::Standard, Stance::Pro, SessionOptions::default());
        let effects = tick(&mut session, 28);
        assert!(effects.contains(&Effect::Notify(DebateEvent::TimeRemaining { seconds: 32 })));
        assert!(!has(&effects, |e| matches!(e, Effect::Notify(DebateEvent::TimeWarning(_)))));

        let effects = tick(&mut session, 3);
        assert!(effects.contains(&Effect::Notify(DebateEvent::TimeWarning(Threshold::ThirtySeconds))));
        assert_eq!(session.time_remaining(), 29);
    }

    #[test]
    fn test_skip_ai_turn_cancels_and_advances() {
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        stream(&mut session, "Some words");
        let effects = session.skip();
        assert!(effects.contains(&Effect::StopSpeaking));
        assert!(has(&effects, |e| matches!(e, Effect::CancelGeneration { .. })));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.current_stage_index(), 1);
    }

    #[test]
    fn test_skip_user_turn_in_shared_stage_advances_stage() {
        let mut session = start(DebateMode::Emotional, Stance::Pro, SessionOptions::default());
        session.handle(SessionEvent::TypedDraft("draft words".into()));
        session.skip();
        assert_eq!(session.messages()[0].content, "draft words");
        assert_eq!(session.status(), SessionStatus::Scoring);
    }

    #[test]
    fn test_generation_failure_adds_notice_and_advances() {
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        let generation = session.active_generation().unwrap();
        stream(&mut session, "Before the error");
        session.handle(SessionEvent::GenerationFailed {
            generation,
            reason: "HTTP 502".into(),
        });

        let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Before the error", "[AI response failed: HTTP 502]"]);
        assert_eq!(session.current_stage_index(), 1);
    }

    #[test]
    fn test_finished_turn_is_spoken_when_playback_enabled() {
        let options = SessionOptions {
            playback: Some(PlaybackSettings {
                voice_id: Some("af_sky".into()),
                rate: 1.25,
            }),
            ..SessionOptions::default()
        };
        let mut session = start(DebateMode::Standard, Stance::Con, options);
        stream(&mut session, "Hear me.");
        let effects = finish(&mut session);
        assert!(effects.contains(&Effect::Speak {
            text: "Hear me.".into(),
            voice_id: Some("af_sky".into()),
            rate: 1.25,
        }));
    }

    #[test]
    fn test_capture_unsupported_degrades_to_text() {
        let mut session = start(DebateMode::Standard, Stance::Pro, voice_options());
        let effects = session.handle(SessionEvent::CaptureUnsupported);
        assert_eq!(session.input_method(), InputMethod::Text);
        assert!(effects.contains(&Effect::Notify(DebateEvent::InputMethodChanged(InputMethod::Text))));
        assert!(session.handle(SessionEvent::SetInputMethod(InputMethod::Voice)).is_empty());
    }

    #[test]
    fn test_input_method_switch_controls_capture() {
        let mut session = start(DebateMode::Standard, Stance::Pro, voice_options());
        assert!(session.handle(SessionEvent::SetInputMethod(InputMethod::Text)).contains(&Effect::StopCapture));
        assert!(session.handle(SessionEvent::SetInputMethod(InputMethod::Voice)).contains(&Effect::StartCapture));
    }

    #[test]
    fn test_transcript_groups_by_stage_after_pause_resume() {
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        stream(&mut session, "Pro part one");
        session.pause();
        session.resume();
        stream(&mut session, "Pro part two");
        finish(&mut session);
        begin_current_stage(&mut session);
        session.submit_user_turn("Con opening");

        let transcript = session.transcript();
        let first = transcript.find("Pro part one").unwrap();
        let second = transcript.find("Pro part two").unwrap();
        let con = transcript.find("Con opening").unwrap();
        assert!(first < second && second < con);
        assert!(transcript.contains("[Pro Opening Statement]\nPro (AI): Pro part one\nPro (AI): Pro part two\n"));
    }

    #[test]
    fn test_judge_failure_yields_fallback_and_completes() {
        let mut session = start(DebateMode::Emotional, Stance::Pro, SessionOptions::default());
        session.skip();
        assert_eq!(session.status(), SessionStatus::Scoring);

        session.handle(SessionEvent::JudgeFinished(Err("network error".into())));
        assert_eq!(session.status(), SessionStatus::Completed);
        let report = session.report().unwrap();
        assert_eq!(report.winner, Winner::Tie);
        assert!(report.fallback);
        let (user, ai) = report.scores.totals();
        assert_eq!(user, ai);
    }

    #[test]
    fn test_judge_mode_mismatch_yields_fallback() {
        let mut session = start(DebateMode::Emotional, Stance::Pro, SessionOptions::default());
        session.skip();
        let wrong = fallback_report(DebateMode::Standard, "x");
        session.handle(SessionEvent::JudgeFinished(Ok(wrong)));
        assert_eq!(session.report().unwrap().mode(), DebateMode::Emotional);
    }

    #[test]
    fn test_full_standard_debate_reaches_completed() {
        let mut session = start(DebateMode::Standard, Stance::Pro, SessionOptions::default());
        let mut guard = 0;
        while session.status() != SessionStatus::Scoring {
            guard += 1;
            assert!(guard < 50, "debate did not finish");
            match session.status() {
                SessionStatus::UserTurn => {
                    session.submit_user_turn("point");
                }
                SessionStatus::AiTurn => {
                    stream(&mut session, "counterpoint");
                    finish(&mut session);
                }
                SessionStatus::StageTransition => {
                    begin_current_stage(&mut session);
                }
                other => panic!("unexpected status {:?}", other),
            }
            assert!(session.current_stage_index() < session.stages().len());
        }
        assert_eq!(session.current_stage_index(), 6);

        let report = fallback_report(DebateMode::Standard, "stub");
        session.handle(SessionEvent::JudgeFinished(Ok(report)));
        assert!(session.status().is_terminal());
        // Shared stages opened by the user get three turns, the one opened
        // by the AI gets two.
        assert_eq!(session.messages().len(), 12);
        let ids: Vec<u64> = session.messages().iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_snapshot_restore_pauses_active_turn() {
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        stream(&mut session, "Unsaved words");
        let snapshot = session.snapshot();

        let (restored, effects) = Session::restore(snapshot, SessionOptions::default()).unwrap();
        assert_eq!(restored.status(), SessionStatus::Paused);
        assert_eq!(restored.paused_status(), Some(SessionStatus::AiTurn));
        assert_eq!(restored.streaming_text(), "");
        assert_eq!(restored.messages()[0].content, "Unsaved words");
        assert!(effects.contains(&Effect::Notify(DebateEvent::Paused {
            from: SessionStatus::AiTurn
        })));
    }

    #[test]
    fn test_snapshot_restore_rejects_missing_stages() {
        let mut session = start(DebateMode::Standard, Stance::Con, SessionOptions::default());
        stream(&mut session, "partial");

        let mut snapshot = session.snapshot();
        snapshot.stages.clear();
        let err = Session::restore(snapshot, SessionOptions::default()).unwrap_err();
        assert!(matches!(err, SparringError::SnapshotError(_)));

        let mut snapshot = session.snapshot();
        snapshot.status = SessionStatus::StageTransition;
        snapshot.current_stage_index = snapshot.stages.len();
        let err = Session::restore(snapshot, SessionOptions::default()).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_snapshot_restore_in_scoring_requests_judgement_again() {
        let mut session = start(DebateMode::Emotional, Stance::Pro, SessionOptions::default());
        session.submit_user_turn("One");
        session.skip();
        assert_eq!(session.status(), SessionStatus::Scoring);

        let (restored, effects) = Session::restore(session.snapshot(), SessionOptions::default()).unwrap();
        assert_eq!(restored.status(), SessionStatus::Scoring);
        assert!(has(&effects, |e| matches!(e, Effect::RequestJudgement(_))));
    }
}
