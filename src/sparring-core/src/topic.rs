//! Debate topics and the sides a human can take.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side of the motion a debater argues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    /// Arguing in favor of the motion.
    Pro,
    /// Arguing against the motion.
    Con,
}

impl Stance {
    pub fn opposite(self) -> Self {
        match self {
            Stance::Pro => Stance::Con,
            Stance::Con => Stance::Pro,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Stance::Pro => "Pro",
            Stance::Con => "Con",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pro" | "for" => Ok(Stance::Pro),
            "con" | "against" => Ok(Stance::Con),
            other => Err(format!("unknown stance '{}', expected pro or con", other)),
        }
    }
}

/// How hard the AI opponent argues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

impl Difficulty {
    pub fn display_name(&self) -> &str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Expert => "Expert",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!(
                "unknown difficulty '{}', expected beginner, intermediate or expert",
                other
            )),
        }
    }
}

/// Structured multi-stage debate or one free-form emotional stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebateMode {
    #[default]
    Standard,
    Emotional,
}

impl DebateMode {
    pub fn display_name(&self) -> &str {
        match self {
            DebateMode::Standard => "Standard debate",
            DebateMode::Emotional => "Emotional debate",
        }
    }

    /// Wire name, as used in judge reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            DebateMode::Standard => "standard",
            DebateMode::Emotional => "emotional",
        }
    }
}

impl FromStr for DebateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(DebateMode::Standard),
            "emotional" => Ok(DebateMode::Emotional),
            other => Err(format!(
                "unknown mode '{}', expected standard or emotional",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TopicCategory {
    #[default]
    Serious,
    Entertainment,
}

/// A debate motion with its two opposing positions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub pro_position: String,
    pub con_position: String,
    pub category: TopicCategory,
    /// Optional background the AI may draw on.
    #[serde(default)]
    pub background: Option<String>,
}

impl Topic {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        pro_position: impl Into<String>,
        con_position: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            pro_position: pro_position.into(),
            con_position: con_position.into(),
            category: TopicCategory::default(),
            background: None,
        }
    }

    pub fn with_category(mut self, category: TopicCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }

    /// Position statement held by the given side.
    pub fn position(&self, stance: Stance) -> &str {
        match stance {
            Stance::Pro => &self.pro_position,
            Stance::Con => &self.con_position,
        }
    }
}
