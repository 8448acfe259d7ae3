//! Streaming generation of the AI debater's turns.
//!
//! A [`Debater`] opens one finite stream of text fragments per request.
//! [`run_generation`] drives such a stream under a cancellation token and
//! reports how it ended. Cancellation is an ordinary ending, not a failure.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::error::{GenerationError, SparringError};
use crate::message::Message;
use crate::prompt::{CONTINUATION_INSTRUCTION, debater_system_prompt};
use crate::stage_plan::{Side, StageConfig};
use crate::topic::{Difficulty, Stance, Topic};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged entry of the conversation sent to the debater.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Convert the message log into the debater's view of the conversation.
///
/// When the log ends with an AI turn (a turn interrupted by a pause is being
/// regenerated) a continuation instruction is appended.
pub fn build_history(messages: &[Message]) -> Vec<HistoryEntry> {
    let mut history: Vec<HistoryEntry> = messages
        .iter()
        .map(|m| HistoryEntry {
            role: match m.speaker {
                Side::User => Role::User,
                Side::Ai => Role::Assistant,
            },
            content: m.content.clone(),
        })
        .collect();

    if history.last().is_some_and(|h| h.role == Role::Assistant) {
        history.push(HistoryEntry {
            role: Role::User,
            content: CONTINUATION_INSTRUCTION.to_string(),
        });
    }

    history
}

/// Everything the debater needs for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebaterRequest {
    pub topic: Topic,
    pub ai_stance: Stance,
    pub difficulty: Difficulty,
    pub stage: StageConfig,
    pub history: Vec<HistoryEntry>,
}

pub type FragmentStream = BoxStream<'static, Result<String, GenerationError>>;

/// Source of the AI opponent's streamed turns.
#[async_trait]
pub trait Debater: Send + Sync {
    /// Open one non-restartable stream of text fragments.
    async fn open(&self, request: DebaterRequest) -> Result<FragmentStream, GenerationError>;
}

/// How a generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
    Failed(GenerationError),
}

/// Open a stream and deliver its fragments until it ends or `cancel` fires.
///
/// No fragment is delivered once cancellation has been requested.
pub async fn run_generation<F>(
    debater: &dyn Debater,
    request: DebaterRequest,
    cancel: CancellationToken,
    on_fragment: F,
) -> StreamOutcome
where
    F: FnMut(String),
{
    let stream = tokio::select! {
        biased;
        () = cancel.cancelled() => return StreamOutcome::Cancelled,
        opened = debater.open(request) => match opened {
            Ok(stream) => stream,
            Err(e) => return StreamOutcome::Failed(e),
        },
    };

    pump(stream, cancel, on_fragment).await
}

/// Drain an open stream under a cancellation token.
pub async fn pump<F>(mut stream: FragmentStream, cancel: CancellationToken, mut on_fragment: F) -> StreamOutcome
where
    F: FnMut(String),
{
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamOutcome::Cancelled,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(fragment)) => {
                if cancel.is_cancelled() {
                    return StreamOutcome::Cancelled;
                }
                on_fragment(fragment);
            }
            Some(Err(e)) => return StreamOutcome::Failed(e),
            None => return StreamOutcome::Completed,
        }
    }
}

/// Debater backed by an OpenAI-compatible streaming chat endpoint.
pub struct OpenAiDebater {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiDebater {
    pub fn new(endpoint: &EndpointConfig, api_key: &str) -> Result<Self, SparringError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
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

    fn build_messages(request: &DebaterRequest) -> Vec<ChatCompletionRequestMessage> {
        let system_prompt = debater_system_prompt(
            &request.topic,
            request.ai_stance,
            request.difficulty,
            &request.stage,
        );

        let mut messages = vec![ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage {
                content: system_prompt.into(),
                name: None,
            },
        )];

        messages.extend(request.history.iter().map(|entry| match entry.role {
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: entry.content.clone().into(),
                name: None,
            }),
            Role::Assistant => {
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(entry.content.clone().into()),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }));

        messages
    }
}

#[async_trait]
impl Debater for OpenAiDebater {
    async fn open(&self, request: DebaterRequest) -> Result<FragmentStream, GenerationError> {
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .messages(Self::build_messages(&request))
            .build()?;

        debug!(
            model = %self.model,
            stage = request.stage.stage_type.as_str(),
            history = request.history.len(),
            "opening debater stream"
        );

        let stream = self.client.chat().create_stream(chat_request).await.map_err(|e| {
            warn!(error = %e, "debater stream failed to open");
            GenerationError::from(e)
        })?;

        let fragments = stream.filter_map(|item| async move {
            match item {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(GenerationError::from(e))),
            }
        });

        Ok(fragments.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::InputMethod;
    use crate::stage_plan::StageType;
    use chrono::Utc;
    use futures::stream;

    fn message(id: u64, speaker: Side, content: &str) -> Message {
        Message {
            id,
            speaker,
            content: content.to_string(),
            timestamp: Utc::now(),
            stage_type: StageType::FreeDebate,
            input_method: InputMethod::Text,
        }
    }

    #[test]
    fn test_history_roles_follow_speakers() {
        let history = build_history(&[message(1, Side::User, "Hi"), message(2, Side::Ai, "Hello")])
            .into_iter()
            .map(|h| h.role)
            .collect::<Vec<_>>();
        assert_eq!(history, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn test_history_appends_continuation_after_ai_turn() {
        let history = build_history(&[message(1, Side::Ai, "Partial")]);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, CONTINUATION_INSTRUCTION);
    }

    #[test]
    fn test_history_without_trailing_ai_turn_is_unchanged() {
        assert!(build_history(&[]).is_empty());
        let history = build_history(&[message(1, Side::User, "Opening")]);
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_pump_delivers_all_fragments_then_completes() {
        let source: FragmentStream =
            stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())]).boxed();
        let mut seen = Vec::new();
        let outcome = pump(source, CancellationToken::new(), |f| seen.push(f)).await;
        assert_eq!(outcome, StreamOutcome::Completed);
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_pump_stops_at_failure() {
        let source: FragmentStream = stream::iter(vec![
            Ok("a".to_string()),
            Err(GenerationError::Api("boom".into())),
            Ok("never".to_string()),
        ])
        .boxed();
        let mut seen = Vec::new();
        let outcome = pump(source, CancellationToken::new(), |f| seen.push(f)).await;
        assert_eq!(outcome, StreamOutcome::Failed(GenerationError::Api("boom".into())));
        assert_eq!(seen, vec!["a"]);
    }

    #[tokio::test]
    async fn test_pump_delivers_nothing_after_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let source: FragmentStream =
            stream::iter(vec![Ok("a".to_string()), Ok("b".to_string()), Ok("c".to_string())]).boxed();
        let mut seen = Vec::new();
        let outcome = pump(source, cancel, |f| {
            seen.push(f);
            trigger.cancel();
        })
        .await;
        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert_eq!(seen, vec!["a"]);
    }
}
