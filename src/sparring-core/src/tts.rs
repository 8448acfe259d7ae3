//! Speech playback backed by kokoro-tiny.
//!
//! Each finished AI turn is synthesised in chunks and written as a WAV file
//! under the configured output directory. Starting a new utterance cancels
//! the one still rendering.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use kokoro_tiny::TtsEngine;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::VoiceConfig;
use crate::error::SparringError;
use crate::speech::{PlaybackCallback, PlaybackEvent, SpeechPlayback};

/// Kokoro renders at 24kHz mono.
pub const SAMPLE_RATE: u32 = 24_000;

/// Kokoro has a strict input limit; ~200 chars is safe.
const MAX_CHUNK_CHARS: usize = 200;

/// Kokoro-backed [`SpeechPlayback`].
pub struct KokoroPlayback {
    engine: Arc<Mutex<TtsEngine>>,
    available_voices: Vec<String>,
    default_voice: String,
    output_dir: PathBuf,
    current: Mutex<Option<CancellationToken>>,
    rendered: Arc<AtomicU64>,
}

impl KokoroPlayback {
    /// Initialize the TTS engine (downloads the model on first run).
    pub async fn new(config: &VoiceConfig) -> Result<Self, SparringError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| SparringError::TtsError(format!("Failed to initialize TTS: {}", e)))?;
        let available_voices = engine.voices();

        let playback = Self {
            engine: Arc::new(Mutex::new(engine)),
            available_voices,
            default_voice: config.voice_id.clone(),
            output_dir: config.output_dir.clone(),
            current: Mutex::new(None),
            rendered: Arc::new(AtomicU64::new(0)),
        };
        playback.validate_voice(&playback.default_voice)?;
        info!(voice = %playback.default_voice, dir = %playback.output_dir.display(), "TTS ready");
        Ok(playback)
    }

    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    /// Validate that a voice ID exists.
    pub fn validate_voice(&self, voice_id: &str) -> Result<(), SparringError> {
        if voice_id.is_empty() || !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(SparringError::TtsError(format!(
                "Unknown voice '{}'. Available voices:\n{}",
                voice_id,
                format_voice_list(&self.available_voices)
            )));
        }
        Ok(())
    }

    fn replace_current(&self, token: Option<CancellationToken>) {
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = current.take() {
            previous.cancel();
        }
        *current = token;
    }
}

impl SpeechPlayback for KokoroPlayback {
    fn is_supported(&self) -> bool {
        true
    }

    fn speak(&self, text: &str, voice_id: Option<&str>, rate: f32, on_event: PlaybackCallback) {
        let voice = voice_id.unwrap_or(&self.default_voice).to_string();
        if let Err(e) = self.validate_voice(&voice) {
            on_event(PlaybackEvent::Error(e.to_string()));
            return;
        }

        let cancel = CancellationToken::new();
        self.replace_current(Some(cancel.clone()));

        let index = self.rendered.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.output_dir.join(utterance_filename(index, text));
        let engine = Arc::clone(&self.engine);
        let text = text.to_string();

        tokio::spawn(async move {
            on_event(PlaybackEvent::Started);
            let render_cancel = cancel.clone();
            let rendered = tokio::task::spawn_blocking(move || {
                render(&engine, &text, &voice, rate, &path, &render_cancel).map(|done| done.then_some(path))
            })
            .await;

            match rendered {
                Ok(Ok(Some(path))) => {
                    debug!(path = %path.display(), "utterance rendered");
                    on_event(PlaybackEvent::Ended);
                }
                Ok(Ok(None)) => debug!("utterance cancelled"),
                Ok(Err(e)) => {
                    warn!(error = %e, "speech synthesis failed");
                    on_event(PlaybackEvent::Error(e.to_string()));
                }
                Err(e) => on_event(PlaybackEvent::Error(format!("TTS task failed: {}", e))),
            }
        });
    }

    fn stop(&self) {
        self.replace_current(None);
    }
}

/// Synthesise `text` and write it to `path`. Returns `false` if cancelled.
fn render(
    engine: &Mutex<TtsEngine>,
    text: &str,
    voice: &str,
    rate: f32,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<bool, SparringError> {
    let mut engine = engine
        .lock()
        .map_err(|_| SparringError::TtsError("TTS engine lock poisoned".to_string()))?;

    let mut segments = Vec::new();
    for chunk in split_into_chunks(text, MAX_CHUNK_CHARS) {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let samples = engine
            .synthesize(&chunk, Some(voice))
            .map_err(|e| SparringError::TtsError(format!("Synthesis failed: {}", e)))?;
        segments.push(samples);
    }
    drop(engine);

    // 0.3s between chunks, 0.5s tail so the last word isn't clipped.
    let mut samples = combine_audio_segments(segments, 0.3, SAMPLE_RATE);
    samples.extend(vec![0.0; (SAMPLE_RATE / 2) as usize]);
    let samples = adjust_audio_speed(samples, rate);

    if cancel.is_cancelled() {
        return Ok(false);
    }
    write_wav(path, &samples)?;
    Ok(true)
}

/// Write mono f32 samples as 16-bit PCM.
pub fn write_wav(path: &Path, samples: &[f32]) -> Result<(), SparringError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SparringError::TtsError(format!("Failed to create {}: {}", parent.display(), e)))?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_error = |e: hound::Error| SparringError::TtsError(format!("Failed to save WAV: {}", e));

    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
    for &sample in samples {
        let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(pcm).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)
}

fn format_voice_list(voices: &[String]) -> String {
    let mut english: Vec<&String> = voices
        .iter()
        .filter(|v| ["af_", "am_", "bf_", "bm_"].iter().any(|p| v.starts_with(p)))
        .collect();
    english.sort();
    english
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split text into chunks that are safe for TTS synthesis.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let mut push_part = |current: &mut String, part: &str| {
        if current.len() + part.len() > max_chars && !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(part);
        current.push(' ');
    };

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if sentence.len() > max_chars {
            // Overlong sentence: fall back to clause boundaries.
            for part in sentence.split_inclusive(',') {
                push_part(&mut current, part.trim());
            }
        } else {
            push_part(&mut current, sentence);
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }
    chunks
}

/// Adjust playback speed using linear interpolation.
/// Rate < 1.0 is slower, rate > 1.0 faster.
pub fn adjust_audio_speed(samples: Vec<f32>, rate: f32) -> Vec<f32> {
    if (rate - 1.0).abs() < 0.001 || rate <= 0.0 {
        return samples;
    }

    let new_len = (samples.len() as f32 / rate) as usize;
    let mut result = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f32 * rate;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f32;

        if src_idx + 1 < samples.len() {
            result.push(samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac);
        } else if src_idx < samples.len() {
            result.push(samples[src_idx]);
        }
    }

    result
}

/// Join segments with `gap_seconds` of silence between them.
pub fn combine_audio_segments(segments: Vec<Vec<f32>>, gap_seconds: f32, sample_rate: u32) -> Vec<f32> {
    let gap = vec![0.0; (gap_seconds * sample_rate as f32) as usize];
    let mut combined = Vec::new();
    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            combined.extend(&gap);
        }
        combined.extend(segment);
    }
    combined
}

/// `ai-turn-007-first-words.wav`
pub fn utterance_filename(index: u64, text: &str) -> String {
    let slug: String = text
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .take(40)
        .collect::<String>()
        .to_lowercase();

    if slug.is_empty() {
        format!("ai-turn-{:03}.wav", index)
    } else {
        format!("ai-turn-{:03}-{}.wav", index, slug)
    }
}
