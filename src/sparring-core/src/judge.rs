//! Judge reports and the judging collaborator.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::error::{JudgeError, SparringError};
use crate::prompt::{JUDGE_SYSTEM_PROMPT, judge_prompt};
use crate::topic::{DebateMode, Topic};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    User,
    Ai,
    Tie,
}

/// Five weighted dimensions of a standard debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandardScore {
    pub total: f64,
    /// Out of 25.
    pub argument_quality: f64,
    /// Out of 25.
    pub logic: f64,
    /// Out of 20.
    pub rebuttal: f64,
    /// Out of 15.
    pub evidence: f64,
    /// Out of 15.
    pub expression: f64,
}

impl StandardScore {
    pub fn dimension_sum(&self) -> f64 {
        self.argument_quality + self.logic + self.rebuttal + self.evidence + self.expression
    }
}

/// Three dimensions of an emotional debate, each out of 100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalScore {
    pub total: f64,
    pub emotion_intensity: f64,
    pub logic_reasoning: f64,
    pub blend_quality: f64,
}

impl EmotionalScore {
    /// 30% intensity, 40% logic, 30% blend.
    pub fn weighted_total(&self) -> f64 {
        0.3 * self.emotion_intensity + 0.4 * self.logic_reasoning + 0.3 * self.blend_quality
    }
}

/// Score shape selected by the debate mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ScoreCard {
    Standard {
        #[serde(rename = "userScore")]
        user: StandardScore,
        #[serde(rename = "aiScore")]
        ai: StandardScore,
    },
    Emotional {
        #[serde(rename = "userScore")]
        user: EmotionalScore,
        #[serde(rename = "aiScore")]
        ai: EmotionalScore,
    },
}

impl ScoreCard {
    pub fn mode(&self) -> DebateMode {
        match self {
            ScoreCard::Standard { .. } => DebateMode::Standard,
            ScoreCard::Emotional { .. } => DebateMode::Emotional,
        }
    }

    /// Overall totals as `(user, ai)`.
    pub fn totals(&self) -> (f64, f64) {
        match self {
            ScoreCard::Standard { user, ai } => (user.total, ai.total),
            ScoreCard::Emotional { user, ai } => (user.total, ai.total),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyMoment {
    pub stage: String,
    pub description: String,
    pub impact: Impact,
}

/// The judge's verdict on a completed session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JudgeReport {
    pub winner: Winner,
    #[serde(flatten)]
    pub scores: ScoreCard,
    pub overall_comment: String,
    #[serde(default)]
    pub user_highlights: Vec<String>,
    #[serde(default)]
    pub user_improvements: Vec<String>,
    #[serde(default)]
    pub stage_comments: BTreeMap<String, String>,
    #[serde(default)]
    pub key_moments: Vec<KeyMoment>,
    /// Set on placeholder reports produced when judging failed.
    #[serde(default)]
    pub fallback: bool,
}

impl JudgeReport {
    pub fn mode(&self) -> DebateMode {
        self.scores.mode()
    }
}

/// Placeholder report stored when the judge could not be reached or parsed.
pub fn fallback_report(mode: DebateMode, reason: &str) -> JudgeReport {
    let (scores, highlight, stage_comments) = match mode {
        DebateMode::Standard => {
            let placeholder = StandardScore {
                total: 70.0,
                argument_quality: 17.0,
                logic: 18.0,
                rebuttal: 14.0,
                evidence: 10.0,
                expression: 11.0,
            };
            (
                ScoreCard::Standard {
                    user: placeholder,
                    ai: placeholder,
                },
                "Completed a full debate",
                BTreeMap::new(),
            )
        }
        DebateMode::Emotional => {
            let placeholder = EmotionalScore {
                total: 70.0,
                emotion_intensity: 70.0,
                logic_reasoning: 70.0,
                blend_quality: 70.0,
            };
            (
                ScoreCard::Emotional {
                    user: placeholder,
                    ai: placeholder,
                },
                "Completed an emotional debate",
                BTreeMap::from([(
                    "emotional_debate".to_string(),
                    "Scoring failed; placeholder data shown.".to_string(),
                )]),
            )
        }
    };

    JudgeReport {
        winner: Winner::Tie,
        scores,
        overall_comment: format!(
            "[Placeholder report] Scoring failed: {}. Check the judge API configuration and try again.",
            reason
        ),
        user_highlights: vec![highlight.to_string()],
        user_improvements: vec![
            "Check the judge API configuration and rerun the debate for a detailed review".to_string(),
        ],
        stage_comments,
        key_moments: Vec::new(),
        fallback: true,
    }
}

/// Strip reasoning tags and code fences around the judge's JSON.
fn extract_json(content: &str) -> &str {
    let start = content.find('{');
    let end = content.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => content.trim(),
    }
}

static REASONING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<thinking[^>]*>.*?</thinking>|<think[^>]*>.*?</think>|<reasoning[^>]*>.*?</reasoning>|<analysis[^>]*>.*?</analysis>",
    )
    .ok()
});

fn strip_reasoning(content: &str) -> String {
    match REASONING.as_ref() {
        Some(re) => re.replace_all(content, "").into_owned(),
        None => content.to_string(),
    }
}

/// Parse the judge's reply into a report for a debate of `expected` mode.
///
/// A reply without a `mode` key is taken to be of the expected mode.
pub fn parse_report(content: &str, expected: DebateMode) -> Result<JudgeReport, JudgeError> {
    let cleaned = strip_reasoning(content);
    let json = extract_json(&cleaned);
    if json.is_empty() {
        return Err(JudgeError::EmptyResponse);
    }

    let mut value: Value =
        serde_json::from_str(json).map_err(|e| JudgeError::Malformed(e.to_string()))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| JudgeError::Malformed("expected a JSON object".to_string()))?;

    match object.get("mode").and_then(Value::as_str) {
        Some(found) if found != expected.as_str() => {
            return Err(JudgeError::ModeMismatch {
                expected: expected.as_str().to_string(),
                found: found.to_string(),
            });
        }
        Some(_) => {}
        None => {
            object.insert("mode".to_string(), Value::from(expected.as_str()));
        }
    }
    object.remove("fallback");

    serde_json::from_value(value).map_err(|e| JudgeError::Malformed(e.to_string()))
}

/// What the judge is asked to score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeRequest {
    pub transcript: String,
    pub topic: Topic,
    pub mode: DebateMode,
}

/// The judging collaborator.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, request: JudgeRequest) -> Result<JudgeReport, JudgeError>;
}

/// Judge backed by an OpenAI-compatible chat endpoint.
pub struct OpenAiJudge {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiJudge {
    pub fn new(endpoint: &EndpointConfig, api_key: &str) -> Result<Self, SparringError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                SparringError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&endpoint.api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: endpoint.model.clone(),
            temperature: endpoint.temperature,
            max_tokens: endpoint.max_tokens,
        })
    }
}

#[async_trait]
impl Judge for OpenAiJudge {
    async fn judge(&self, request: JudgeRequest) -> Result<JudgeReport, JudgeError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: JUDGE_SYSTEM_PROMPT.into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: judge_prompt(&request.transcript, request.mode).into(),
                name: None,
            }),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .messages(messages)
            .build()?;

        debug!(model = %self.model, topic = %request.topic.title, "requesting judgement");

        let response = self.client.chat().create(chat_request).await?;
        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or(JudgeError::EmptyResponse)?;

        parse_report(&content, request.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD_REPLY: &str = r#"{
        "mode": "standard",
        "winner": "user",
        "userScore": {"total": 82, "argumentQuality": 21, "logic": 20, "rebuttal": 17, "evidence": 12, "expression": 12},
        "aiScore": {"total": 75, "argumentQuality": 19, "logic": 19, "rebuttal": 15, "evidence": 11, "expression": 11},
        "overallComment": "A close contest.",
        "userHighlights": ["Clear framing"],
        "userImprovements": ["More evidence"],
        "stageComments": {"opening": "Strong"},
        "keyMoments": [{"stage": "Free Debate", "description": "Turned the cost argument", "impact": "positive"}]
    }"#;

    #[test]
    fn test_parse_standard_report() {
        let report = parse_report(STANDARD_REPLY, DebateMode::Standard).unwrap();
        assert_eq!(report.winner, Winner::User);
        assert_eq!(report.mode(), DebateMode::Standard);
        assert_eq!(report.scores.totals(), (82.0, 75.0));
        assert_eq!(report.key_moments[0].impact, Impact::Positive);
        assert!(!report.fallback);
        match report.scores {
            ScoreCard::Standard { user, .. } => assert_eq!(user.dimension_sum(), 82.0),
            ScoreCard::Emotional { .. } => panic!("expected standard scores"),
        }
    }

    #[test]
    fn test_parse_fills_missing_mode_and_strips_wrapping() {
        let reply = r#"<think>weighing it up</think>
```json
{"winner": "tie",
 "userScore": {"total": 70, "emotionIntensity": 70, "logicReasoning": 70, "blendQuality": 70},
 "aiScore": {"total": 64, "emotionIntensity": 60, "logicReasoning": 70, "blendQuality": 60},
 "overallComment": "Even."}
```"#;
        let report = parse_report(reply, DebateMode::Emotional).unwrap();
        assert_eq!(report.mode(), DebateMode::Emotional);
        assert!(report.user_highlights.is_empty());
        match report.scores {
            ScoreCard::Emotional { ai, .. } => assert!((ai.weighted_total() - 64.0).abs() < 1e-9),
            ScoreCard::Standard { .. } => panic!("expected emotional scores"),
        }
    }

    #[test]
    fn test_strip_reasoning_handles_every_tag() {
        let reply = "<thinking>a {}</thinking>x<THINK>b</THINK>y<reasoning type=\"long\">c</reasoning>z<analysis>\nd\n</analysis>";
        assert_eq!(strip_reasoning(reply), "xyz");
    }

    #[test]
    fn test_parse_rejects_mode_mismatch() {
        let err = parse_report(STANDARD_REPLY, DebateMode::Emotional).unwrap_err();
        assert!(matches!(err, JudgeError::ModeMismatch { .. }));
    }

    #[test]
    fn test_parse_rejects_missing_scores() {
        let err = parse_report(r#"{"winner": "ai", "overallComment": "x"}"#, DebateMode::Standard)
            .unwrap_err();
        assert!(matches!(err, JudgeError::Malformed(_)));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_report("no verdict today", DebateMode::Standard).is_err());
    }

    #[test]
    fn test_fallback_report_is_neutral_tie() {
        let report = fallback_report(DebateMode::Standard, "network down");
        assert_eq!(report.winner, Winner::Tie);
        assert!(report.fallback);
        assert!(report.overall_comment.contains("network down"));
        assert_eq!(report.scores.totals(), (70.0, 70.0));
        match report.scores {
            ScoreCard::Standard { user, ai } => {
                assert_eq!(user, ai);
                assert_eq!(user.dimension_sum(), 70.0);
            }
            ScoreCard::Emotional { .. } => panic!("expected standard scores"),
        }

        let emotional = fallback_report(DebateMode::Emotional, "timeout");
        assert_eq!(emotional.mode(), DebateMode::Emotional);
        assert_eq!(emotional.scores.totals(), (70.0, 70.0));
    }

    #[test]
    fn test_report_serde_round_trip_keeps_mode_tag() {
        let report = fallback_report(DebateMode::Emotional, "x");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "emotional");
        assert_eq!(json["userScore"]["blendQuality"], 70.0);
        let back: JudgeReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
