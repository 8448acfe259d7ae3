//! Messages spoken during a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage_plan::{Side, StageType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    Voice,
    #[default]
    Text,
}

/// One completed turn's content. Never modified once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique within a session and increasing in append order.
    pub id: u64,
    pub speaker: Side,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub stage_type: StageType,
    pub input_method: InputMethod,
}
