//! Sparring Core Library
//!
//! Debate practice against a streaming AI opponent: stage plans, the turn
//! state machine, the countdown, the debater stream, speech seams and the
//! judge.

pub mod ai_stream;
pub mod config;
pub mod error;
pub mod judge;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod snapshot;
pub mod speech;
pub mod stage_plan;
pub mod timer;
pub mod topic;
pub mod transcript;
pub mod tts;

pub use ai_stream::{Debater, DebaterRequest, OpenAiDebater, StreamOutcome};
pub use config::Config;
pub use error::{GenerationError, JudgeError, SparringError, SpeechError};
pub use judge::{Judge, JudgeReport, OpenAiJudge, ScoreCard, Winner};
pub use message::{InputMethod, Message};
pub use orchestrator::{DebateCallback, DebateOrchestrator, SessionHandle, Timings};
pub use session::{
    DebateEvent, Effect, Session, SessionEvent, SessionOptions, SessionSetup, SessionStatus,
};
pub use snapshot::{SessionSnapshot, SnapshotStore};
pub use speech::{
    CaptureController, NullPlayback, Recognizer, SpeechPlayback, UnsupportedRecognizer,
};
pub use stage_plan::{DebateConfig, Side, StageConfig, StageType, build_stage_plan, format_time};
pub use timer::{Countdown, Threshold, Ticker};
pub use topic::{DebateMode, Difficulty, Stance, Topic};
pub use tts::KokoroPlayback;
