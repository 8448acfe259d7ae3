//! Prompt text for the AI debater and the AI judge.

use crate::stage_plan::{StageConfig, StageType};
use crate::topic::{DebateMode, Difficulty, Stance, Topic};

/// Appended to the history when the last entry is already the AI's, so the
/// model carries on instead of starting over.
pub const CONTINUATION_INSTRUCTION: &str =
    "Please continue your previous statement without repeating what you already said.";

pub const JUDGE_SYSTEM_PROMPT: &str = "You are a professional debate judge. Reply with the JSON \
report exactly as requested and nothing else.";

const DEBATER_TEMPLATE: &str = r#"You are an experienced competitive debater taking part in a formal debate.

MOTION: {topic}
YOUR SIDE ({stance}): {position}
OPPONENT'S SIDE: {opponent_position}
{background}
{difficulty_guide}

{stage_guide}

RULES:
- Hold the {stance} position "{position}" throughout and never concede it
- Address your opponent as "my opponent"
- Stay courteous and professional
- Keep what you say relevant to the current stage
- Never mention being an AI or step out of the role
- Keep each statement under 300 words

CRITICAL OUTPUT RULES:
- Output ONLY your spoken words
- No stage directions, no markdown, no asterisks
"#;

fn difficulty_guide(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Beginner => {
            "You are a beginner-level debater. Use simple, direct arguments in plain language. \
             Avoid intricate logic or jargon and leave your opponent room to respond."
        }
        Difficulty::Intermediate => {
            "You are an intermediate debater. Your arguments have some depth and use facts and \
             data. Rebut effectively without being overly sharp."
        }
        Difficulty::Expert => {
            "You are a top-tier debater. Your arguments are incisive and rigorous and you find \
             the gaps in your opponent's reasoning. Use advanced techniques such as reductio ad \
             absurdum and argument by analogy, and cite sources."
        }
    }
}

fn stage_guide(stage_type: StageType, ai_stance: Stance) -> &'static str {
    const QUESTIONER: &str = "This is cross-examination and you are asking the questions. Ask \
        short, pointed questions that expose weaknesses in your opponent's case.";
    const RESPONDENT: &str = "This is cross-examination and your opponent is questioning you. \
        Answer each question directly and concisely without dodging.";

    match stage_type {
        StageType::OpeningPro | StageType::OpeningCon => {
            "This is the opening statement. Lay out your side's position and two or three core \
             arguments systematically."
        }
        StageType::CrossPro if ai_stance == Stance::Pro => QUESTIONER,
        StageType::CrossCon if ai_stance == Stance::Con => QUESTIONER,
        StageType::CrossPro | StageType::CrossCon => RESPONDENT,
        StageType::FreeDebate => {
            "This is free debate. Rebut what your opponent just said and reinforce your own \
             case. Keep each contribution to two to four sentences."
        }
        StageType::ClosingCon | StageType::ClosingPro => {
            "This is the closing statement. Summarise the debate, restate your core arguments, \
             point out where your opponent fell short and finish strongly."
        }
        StageType::EmotionalDebate => {
            "This is an emotional debate. Argue with strong conviction and expressive, \
             emotionally charged language while staying basically polite and logical. Keep \
             each contribution to two to four sentences."
        }
    }
}

/// System prompt for the AI debater in the given stage.
pub fn debater_system_prompt(
    topic: &Topic,
    ai_stance: Stance,
    difficulty: Difficulty,
    stage: &StageConfig,
) -> String {
    let background = topic
        .background
        .as_deref()
        .map(|b| format!("BACKGROUND: {}\n", b))
        .unwrap_or_default();

    DEBATER_TEMPLATE
        .replace("{topic}", &topic.title)
        .replace("{stance}", ai_stance.display_name())
        .replace("{position}", topic.position(ai_stance))
        .replace("{opponent_position}", topic.position(ai_stance.opposite()))
        .replace("{background}", &background)
        .replace("{difficulty_guide}", difficulty_guide(difficulty))
        .replace("{stage_guide}", stage_guide(stage.stage_type, ai_stance))
}

const STANDARD_JUDGE_SHAPE: &str = r#"{
  "mode": "standard",
  "winner": "user" | "ai" | "tie",
  "userScore": {"total": 0-100, "argumentQuality": 0-25, "logic": 0-25, "rebuttal": 0-20, "evidence": 0-15, "expression": 0-15},
  "aiScore": {"total": 0-100, "argumentQuality": 0-25, "logic": 0-25, "rebuttal": 0-20, "evidence": 0-15, "expression": 0-15},
  "overallComment": "about 200 words on the whole debate",
  "userHighlights": ["..."],
  "userImprovements": ["..."],
  "stageComments": {"opening": "...", "cross_examination": "...", "free_debate": "...", "closing": "..."},
  "keyMoments": [{"stage": "...", "description": "...", "impact": "positive" | "negative" | "neutral"}]
}

Scoring dimensions:
- argumentQuality (max 25): are the arguments clear, strong and persuasive
- logic (max 25): is the reasoning sound and free of fallacies
- rebuttal (max 20): does the side answer and rebut the other effectively
- evidence (max 15): are facts, data and cases used well
- expression (max 15): is the delivery fluent and composed

total must equal the sum of the five dimensions."#;

const EMOTIONAL_JUDGE_SHAPE: &str = r#"{
  "mode": "emotional",
  "winner": "user" | "ai" | "tie",
  "userScore": {"total": 0-100, "emotionIntensity": 0-100, "logicReasoning": 0-100, "blendQuality": 0-100},
  "aiScore": {"total": 0-100, "emotionIntensity": 0-100, "logicReasoning": 0-100, "blendQuality": 0-100},
  "overallComment": "about 200 words on the whole debate",
  "userHighlights": ["..."],
  "userImprovements": ["..."],
  "stageComments": {"emotional_debate": "..."},
  "keyMoments": [{"stage": "Emotional Debate", "description": "...", "impact": "positive" | "negative" | "neutral"}]
}

Weighting used for total:
- emotionIntensity (30%): emotional colour and strength of conviction
- logicReasoning (40%): basic logic and clear structure under emotional delivery
- blendQuality (30%): how naturally emotion and logic are combined"#;

/// User prompt asking the judge to score a transcript.
pub fn judge_prompt(transcript: &str, mode: DebateMode) -> String {
    let shape = match mode {
        DebateMode::Standard => STANDARD_JUDGE_SHAPE,
        DebateMode::Emotional => EMOTIONAL_JUDGE_SHAPE,
    };

    format!(
        "You are a professional, impartial debate judge. Judge the following {} from its full \
         transcript.\n\n{}\n\nReturn your verdict strictly as JSON in this shape, with no other \
         text:\n\n{}\n\nJudge fairly and do not favour either side because it is an AI.",
        mode.display_name().to_lowercase(),
        transcript,
        shape
    )
}
