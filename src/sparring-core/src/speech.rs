//! Speech capture and playback seams.
//!
//! Both capabilities are optional. A session only ever sees them through
//! [`Recognizer`] and [`SpeechPlayback`], so a platform without either simply
//! plugs in [`UnsupportedRecognizer`] / [`NullPlayback`] and the debate falls
//! back to typed input and silent AI turns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::SpeechError;

/// Pause before reconnecting after a transient recognizer error.
pub const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Pause before restarting a recognizer stream that ended on its own.
pub const RESTART_DELAY: Duration = Duration::from_millis(300);

/// What a recognizer reports while listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// A committed piece of transcript. Appended to what came before.
    Final(String),
    /// The current best guess for speech not yet committed. Replaces the
    /// previous interim text.
    Interim(String),
    /// Silence; not an error.
    NoSpeech,
    Error(SpeechError),
}

pub type RecognizerStream = BoxStream<'static, RecognizerEvent>;

/// A speech-to-text capability.
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Open one listening stream. The stream may end at any time (platform
    /// recognizers stop after a stretch of silence); the controller restarts it.
    async fn listen(&self) -> Result<RecognizerStream, SpeechError>;
}

/// Recognizer for platforms without speech capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedRecognizer;

#[async_trait]
impl Recognizer for UnsupportedRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    async fn listen(&self) -> Result<RecognizerStream, SpeechError> {
        Err(SpeechError::Unsupported)
    }
}

/// Updates forwarded by [`CaptureController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureUpdate {
    Final(String),
    Interim(String),
    /// Capture cannot work on this system; stop asking for it.
    Unsupported,
    Failed(SpeechError),
}

/// Keeps a recognizer listening for as long as capture is wanted.
///
/// Silence is ignored, transient errors are retried after
/// [`TRANSIENT_RETRY_DELAY`] and streams that end on their own are restarted
/// after [`RESTART_DELAY`]. Nothing is forwarded once [`stop`] has been called.
///
/// [`stop`]: CaptureController::stop
pub struct CaptureController {
    recognizer: Arc<dyn Recognizer>,
    cancel: Option<CancellationToken>,
    retry_delay: Duration,
    restart_delay: Duration,
}

impl CaptureController {
    pub fn new(recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            recognizer,
            cancel: None,
            retry_delay: TRANSIENT_RETRY_DELAY,
            restart_delay: RESTART_DELAY,
        }
    }

    pub fn with_delays(mut self, retry_delay: Duration, restart_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self.restart_delay = restart_delay;
        self
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_supported()
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Start listening, replacing any previous capture.
    pub fn start<F>(&mut self, on_update: F)
    where
        F: Fn(CaptureUpdate) + Send + Sync + 'static,
    {
        self.stop();
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let recognizer = Arc::clone(&self.recognizer);
        let retry_delay = self.retry_delay;
        let restart_delay = self.restart_delay;

        tokio::spawn(async move {
            let deliver = |update: CaptureUpdate| {
                if !cancel.is_cancelled() {
                    on_update(update);
                }
            };

            loop {
                let opened = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    opened = recognizer.listen() => opened,
                };

                let delay = match opened {
                    Ok(mut stream) => {
                        debug!("speech capture listening");
                        let mut delay = restart_delay;
                        loop {
                            let event = tokio::select! {
                                biased;
                                () = cancel.cancelled() => return,
                                event = stream.next() => event,
                            };
                            match event {
                                Some(RecognizerEvent::Final(text)) => deliver(CaptureUpdate::Final(text)),
                                Some(RecognizerEvent::Interim(text)) => {
                                    deliver(CaptureUpdate::Interim(text))
                                }
                                Some(RecognizerEvent::NoSpeech) => trace!("no speech detected"),
                                Some(RecognizerEvent::Error(SpeechError::Transient(reason))) => {
                                    debug!(%reason, "transient speech error, reconnecting");
                                    delay = retry_delay;
                                    break;
                                }
                                Some(RecognizerEvent::Error(SpeechError::Unsupported)) => {
                                    deliver(CaptureUpdate::Unsupported);
                                    return;
                                }
                                Some(RecognizerEvent::Error(e)) => {
                                    warn!(error = %e, "speech capture failed");
                                    deliver(CaptureUpdate::Failed(e));
                                    return;
                                }
                                None => break,
                            }
                        }
                        delay
                    }
                    Err(SpeechError::Transient(reason)) => {
                        debug!(%reason, "speech capture failed to open, retrying");
                        retry_delay
                    }
                    Err(SpeechError::Unsupported) => {
                        deliver(CaptureUpdate::Unsupported);
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "speech capture failed to open");
                        deliver(CaptureUpdate::Failed(e));
                        return;
                    }
                };

                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        });
    }

    /// Stop listening. Idempotent.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            debug!("speech capture stopped");
            cancel.cancel();
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started,
    Ended,
    Error(String),
}

pub type PlaybackCallback = Box<dyn Fn(PlaybackEvent) + Send + Sync>;

/// Text-to-speech output. A new utterance replaces the one playing.
pub trait SpeechPlayback: Send + Sync {
    fn is_supported(&self) -> bool;

    fn speak(&self, text: &str, voice_id: Option<&str>, rate: f32, on_event: PlaybackCallback);

    /// Stop the current utterance, if any. Idempotent.
    fn stop(&self);
}

/// Playback for platforms without speech output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlayback;

impl SpeechPlayback for NullPlayback {
    fn is_supported(&self) -> bool {
        false
    }

    fn speak(&self, _text: &str, _voice_id: Option<&str>, _rate: f32, on_event: PlaybackCallback) {
        on_event(PlaybackEvent::Error("speech playback is not available".to_string()));
    }

    fn stop(&self) {}
}
