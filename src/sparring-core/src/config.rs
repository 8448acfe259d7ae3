//! Configuration module for loading TOML config files.

use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SparringError;
use crate::message::InputMethod;
use crate::stage_plan::{DebateConfig, FirstSpeakerPolicy};

/// Longest accepted duration of any stage, in seconds.
pub const MAX_DURATION_SECS: u32 = 24 * 60 * 60;

/// Root configuration structure. Every section may be omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub durations: DebateConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub first_speaker: FirstSpeakerPolicy,
    #[serde(default = "default_debater", deserialize_with = "debater_section")]
    pub debater: EndpointConfig,
    #[serde(default = "default_judge", deserialize_with = "judge_section")]
    pub judge: EndpointConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            durations: DebateConfig::default(),
            session: SessionSettings::default(),
            first_speaker: FirstSpeakerPolicy::default(),
            debater: default_debater(),
            judge: default_judge(),
            voice: VoiceConfig::default(),
        }
    }
}

/// Flow timings of a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Ticks of the pre-start countdown.
    pub countdown_ticks: u32,
    /// Pause between announcing a stage and its first turn.
    pub transition_delay_ms: u64,
    /// The AI hands a shared stage back only if more than this many seconds remain.
    pub handoff_min_seconds: u32,
    pub input: InputMethod,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            countdown_ticks: 3,
            transition_delay_ms: 2200,
            handoff_min_seconds: 5,
            input: InputMethod::Text,
        }
    }
}

/// An OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EndpointConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

fn default_debater() -> EndpointConfig {
    EndpointConfig {
        api_base: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o-mini".to_string(),
        temperature: 0.75,
        max_tokens: 800,
    }
}

/// An endpoint section as written; missing keys keep the section's defaults.
#[derive(Debug, Deserialize)]
struct EndpointOverrides {
    api_base: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl EndpointOverrides {
    fn over(self, base: EndpointConfig) -> EndpointConfig {
        EndpointConfig {
            api_base: self.api_base.unwrap_or(base.api_base),
            model: self.model.unwrap_or(base.model),
            temperature: self.temperature.unwrap_or(base.temperature),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
        }
    }
}

fn debater_section<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EndpointConfig, D::Error> {
    EndpointOverrides::deserialize(deserializer).map(|o| o.over(default_debater()))
}

fn judge_section<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EndpointConfig, D::Error> {
    EndpointOverrides::deserialize(deserializer).map(|o| o.over(default_judge()))
}

fn default_judge() -> EndpointConfig {
    EndpointConfig {
        api_base: "https://api.deepseek.com/v1".to_string(),
        model: "deepseek-chat".to_string(),
        temperature: 0.4,
        max_tokens: 2000,
    }
}

/// Speech capture and playback configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub capture: bool,
    pub playback: bool,
    pub voice_id: String,
    pub rate: f32,
    /// Where rendered utterances are written.
    pub output_dir: PathBuf,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            capture: true,
            playback: true,
            voice_id: "af_sky".to_string(),
            rate: 1.0,
            output_dir: PathBuf::from("sparring-audio"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SparringError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| SparringError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, SparringError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| SparringError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it exists,
    /// else fall back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SparringError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// `<config dir>/sparring/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sparring").join("config.toml"))
    }

    fn validate(&self) -> Result<(), SparringError> {
        let d = &self.durations;
        let limits = [
            ("opening", d.opening),
            ("cross_exam", d.cross_exam),
            ("free_debate", d.free_debate),
            ("closing", d.closing),
            ("emotional_total", d.emotional_total),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, secs)| *secs == 0) {
            return Err(SparringError::ConfigError(format!(
                "durations.{} must be greater than zero",
                name
            )));
        }
        let too_long = limits
            .iter()
            .copied()
            .chain(std::iter::once(("prep", d.prep)))
            .find(|(_, secs)| *secs > MAX_DURATION_SECS);
        if let Some((name, secs)) = too_long {
            return Err(SparringError::ConfigError(format!(
                "durations.{} is {}s, the limit is {}s",
                name, secs, MAX_DURATION_SECS
            )));
        }
        if !(self.voice.rate > 0.0) {
            return Err(SparringError::ConfigError(
                "voice.rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
