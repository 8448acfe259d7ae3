//! Stage plans for a debate session.
//!
//! A plan is the ordered list of timed stages a session walks through. It is
//! computed once when the session starts and never changes afterwards.

use serde::{Deserialize, Serialize};

use crate::topic::{DebateMode, Stance};

/// Per-stage durations in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DebateConfig {
    pub opening: u32,
    pub cross_exam: u32,
    /// Per side; the free debate stage lasts twice this long.
    pub free_debate: u32,
    pub closing: u32,
    /// Preparation time between stages, kept for presentation.
    pub prep: u32,
    pub emotional_total: u32,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            opening: 180,
            cross_exam: 120,
            free_debate: 180,
            closing: 120,
            prep: 15,
            emotional_total: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    OpeningPro,
    OpeningCon,
    CrossPro,
    CrossCon,
    FreeDebate,
    ClosingCon,
    ClosingPro,
    EmotionalDebate,
}

impl StageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::OpeningPro => "opening_pro",
            StageType::OpeningCon => "opening_con",
            StageType::CrossPro => "cross_pro",
            StageType::CrossCon => "cross_con",
            StageType::FreeDebate => "free_debate",
            StageType::ClosingCon => "closing_con",
            StageType::ClosingPro => "closing_pro",
            StageType::EmotionalDebate => "emotional_debate",
        }
    }
}

/// Who is assigned to speak in a stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Pro,
    Con,
    Both,
}

impl Speaker {
    fn single(stance: Stance) -> Self {
        match stance {
            Stance::Pro => Speaker::Pro,
            Stance::Con => Speaker::Con,
        }
    }
}

/// The human or the AI opponent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    User,
    Ai,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::User => Side::Ai,
            Side::Ai => Side::User,
        }
    }
}

/// One timed phase of a debate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub display_name: String,
    pub description: String,
    pub speaker: Speaker,
    /// Seconds.
    pub time_limit: u32,
}

impl StageConfig {
    fn new(
        stage_type: StageType,
        display_name: &str,
        description: &str,
        speaker: Speaker,
        time_limit: u32,
    ) -> Self {
        Self {
            stage_type,
            display_name: display_name.to_string(),
            description: description.to_string(),
            speaker,
            time_limit,
        }
    }
}

/// Build the ordered stage plan for a session.
///
/// `standard` yields the seven stages of a formal debate; `emotional` yields a
/// single shared stage. The user's stance does not change the plan itself,
/// only who speaks when (see [`decide_first_speaker`]).
pub fn build_stage_plan(mode: DebateMode, _stance: Stance, config: &DebateConfig) -> Vec<StageConfig> {
    match mode {
        DebateMode::Emotional => vec![StageConfig::new(
            StageType::EmotionalDebate,
            "Emotional Debate",
            "Argue with strong conviction and feeling while staying civil.",
            Speaker::Both,
            config.emotional_total,
        )],
        DebateMode::Standard => vec![
            StageConfig::new(
                StageType::OpeningPro,
                "Pro Opening Statement",
                "Pro sets out its position and main arguments.",
                Speaker::single(Stance::Pro),
                config.opening,
            ),
            StageConfig::new(
                StageType::OpeningCon,
                "Con Opening Statement",
                "Con sets out its position and main arguments.",
                Speaker::single(Stance::Con),
                config.opening,
            ),
            StageConfig::new(
                StageType::CrossPro,
                "Pro Cross-Examination",
                "Pro questions Con, Con answers.",
                Speaker::Both,
                config.cross_exam,
            ),
            StageConfig::new(
                StageType::CrossCon,
                "Con Cross-Examination",
                "Con questions Pro, Pro answers.",
                Speaker::Both,
                config.cross_exam,
            ),
            StageConfig::new(
                StageType::FreeDebate,
                "Free Debate",
                "Both sides speak in turn.",
                Speaker::Both,
                // Shared by both sides.
                config.free_debate.saturating_mul(2),
            ),
            StageConfig::new(
                StageType::ClosingCon,
                "Con Closing Statement",
                "Con summarises its case.",
                Speaker::single(Stance::Con),
                config.closing,
            ),
            StageConfig::new(
                StageType::ClosingPro,
                "Pro Closing Statement",
                "Pro summarises its case.",
                Speaker::single(Stance::Pro),
                config.closing,
            ),
        ],
    }
}

/// Who opens a `both`-speaker stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Opener {
    User,
    Ai,
    /// Whoever holds this stance.
    Pro,
    Con,
}

impl Opener {
    fn resolve(self, user_stance: Stance) -> Side {
        match self {
            Opener::User => Side::User,
            Opener::Ai => Side::Ai,
            Opener::Pro if user_stance == Stance::Pro => Side::User,
            Opener::Con if user_stance == Stance::Con => Side::User,
            Opener::Pro | Opener::Con => Side::Ai,
        }
    }
}

/// Opening side for each `both`-speaker stage type.
///
/// Cross-examination opens with the questioning side; free debate and the
/// emotional stage open with the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FirstSpeakerPolicy {
    pub cross_pro: Opener,
    pub cross_con: Opener,
    pub free_debate: Opener,
    pub emotional_debate: Opener,
}

impl Default for FirstSpeakerPolicy {
    fn default() -> Self {
        Self {
            cross_pro: Opener::Pro,
            cross_con: Opener::Con,
            free_debate: Opener::User,
            emotional_debate: Opener::User,
        }
    }
}

impl FirstSpeakerPolicy {
    fn opener_for(&self, stage_type: StageType) -> Opener {
        match stage_type {
            StageType::CrossPro => self.cross_pro,
            StageType::CrossCon => self.cross_con,
            StageType::EmotionalDebate => self.emotional_debate,
            _ => self.free_debate,
        }
    }
}

/// Decide who takes the first turn of a stage.
pub fn decide_first_speaker(
    stage: &StageConfig,
    user_stance: Stance,
    policy: &FirstSpeakerPolicy,
) -> Side {
    match stage.speaker {
        Speaker::Pro if user_stance == Stance::Pro => Side::User,
        Speaker::Con if user_stance == Stance::Con => Side::User,
        Speaker::Pro | Speaker::Con => Side::Ai,
        Speaker::Both => policy.opener_for(stage.stage_type).resolve(user_stance),
    }
}

/// Format seconds as `mm:ss`.
pub fn format_time(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
