//! Error types for the sparring system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SparringError {
    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error("TTS error: {0}")]
    TtsError(String),

    #[error("Session has already ended")]
    SessionClosed,

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error(transparent)]
    Judge(#[from] JudgeError),
}

/// Failure of a debater generation other than cancellation.
///
/// Cancellation is a normal way for a stream to end and never shows up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("debater API error: {0}")]
    Api(String),

    #[error("malformed debater response: {0}")]
    Malformed(String),
}

impl From<async_openai::error::OpenAIError> for GenerationError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        GenerationError::Api(err.to_string())
    }
}

/// Failure to obtain a usable report from the judge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JudgeError {
    #[error("judge API error: {0}")]
    Api(String),

    #[error("judge returned no content")]
    EmptyResponse,

    #[error("judge report could not be parsed: {0}")]
    Malformed(String),

    #[error("judge returned a {found} report for a {expected} debate")]
    ModeMismatch { expected: String, found: String },
}

impl From<async_openai::error::OpenAIError> for JudgeError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        JudgeError::Api(err.to_string())
    }
}

/// Speech capture / playback failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    #[error("speech capability is not available on this system")]
    Unsupported,

    /// Recoverable transport blip; the capture controller retries these.
    #[error("transient speech transport error: {0}")]
    Transient(String),

    #[error("speech error: {0}")]
    Fatal(String),
}
