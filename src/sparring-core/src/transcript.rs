//! Plain-text transcript handed to the judge.

use crate::message::Message;
use crate::stage_plan::{Side, StageConfig};
use crate::topic::{DebateMode, Stance, Topic};

/// Inputs of [`assemble_transcript`].
#[derive(Debug, Clone, Copy)]
pub struct TranscriptInput<'a> {
    pub topic: &'a Topic,
    pub mode: DebateMode,
    pub user_stance: Stance,
    pub stages: &'a [StageConfig],
    pub messages: &'a [Message],
}

fn label(speaker: Side, user_stance: Stance) -> String {
    match speaker {
        Side::User => format!("{} (user)", user_stance),
        Side::Ai => format!("{} (AI)", user_stance.opposite()),
    }
}

/// Indent every line after the first so a message stays one labelled block.
fn indent_continuation(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n    ")
}

/// Render the session for the judge.
///
/// Messages are grouped per stage in plan order, not in the order they were
/// appended; stages without messages are left out.
pub fn assemble_transcript(input: TranscriptInput<'_>) -> String {
    let TranscriptInput {
        topic,
        mode,
        user_stance,
        stages,
        messages,
    } = input;

    let mut transcript = String::new();
    transcript.push_str(&format!("Topic: {}\n", topic.title));
    transcript.push_str(&format!("Mode: {}\n", mode.display_name()));
    transcript.push_str(&format!("Pro position: {}\n", topic.pro_position));
    transcript.push_str(&format!("Con position: {}\n", topic.con_position));
    transcript.push_str(&format!("User holds: {}\n", user_stance));
    transcript.push_str(&format!("AI holds: {}\n", user_stance.opposite()));

    for stage in stages {
        let mut stage_messages = messages
            .iter()
            .filter(|m| m.stage_type == stage.stage_type)
            .peekable();
        if stage_messages.peek().is_none() {
            continue;
        }

        transcript.push_str(&format!("\n[{}]\n", stage.display_name));
        for message in stage_messages {
            transcript.push_str(&format!(
                "{}: {}\n",
                label(message.speaker, user_stance),
                indent_continuation(message.content.trim())
            ));
        }
    }

    transcript
}
