//! Sparring CLI - debate practice against an AI opponent
//!
//! Runs one timed debate session in the terminal. Type a line to speak,
//! or use the slash commands listed at start-up.

mod logging;

use clap::{ArgAction, Parser};
use colored::Colorize;
use sparring_core::judge::Impact;
use sparring_core::session::PlaybackSettings;
use sparring_core::{
    Config, DebateCallback, DebateEvent, DebateMode, DebateOrchestrator, Difficulty, InputMethod,
    JudgeReport, KokoroPlayback, NullPlayback, OpenAiDebater, OpenAiJudge, Recognizer, ScoreCard, Session,
    SessionHandle, SessionOptions, SessionSetup, Side, SnapshotStore, SpeechPlayback, Stance,
    Threshold, Timings, Topic, UnsupportedRecognizer, Winner, format_time,
};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "sparring",
    version,
    about = "Debate practice - argue a motion against an AI opponent",
    long_about = "Runs a timed debate against an AI opponent using OpenAI-compatible APIs, then has a judge model score it."
)]
struct Cli {
    /// The motion to debate
    #[arg(value_name = "TOPIC", required_unless_present = "resume")]
    topic: Option<String>,

    /// What the pro side argues
    #[arg(long, value_name = "TEXT")]
    pro: Option<String>,

    /// What the con side argues
    #[arg(long, value_name = "TEXT")]
    con: Option<String>,

    /// Background material shown to the AI
    #[arg(long, value_name = "TEXT")]
    background: Option<String>,

    /// The side you argue (pro or con)
    #[arg(short, long, default_value = "pro", value_name = "STANCE")]
    stance: Stance,

    /// AI opponent level (beginner, intermediate, expert)
    #[arg(short, long, default_value = "intermediate", value_name = "LEVEL")]
    difficulty: Difficulty,

    /// Debate mode (standard, emotional)
    #[arg(short, long, default_value = "standard", value_name = "MODE")]
    mode: DebateMode,

    /// Path to a config file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Continue the last unfinished session
    #[arg(long)]
    resume: bool,

    /// Do not render AI turns as speech
    #[arg(long)]
    no_tts: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref())?;

    let debater = OpenAiDebater::new(&config.debater, &api_key("SPARRING_DEBATER_API_KEY"))?;
    let judge = OpenAiJudge::new(&config.judge, &api_key("SPARRING_JUDGE_API_KEY"))?;

    let playback: Arc<dyn SpeechPlayback> = if config.voice.playback && !cli.no_tts {
        match KokoroPlayback::new(&config.voice).await {
            Ok(tts) => Arc::new(tts),
            Err(e) => {
                warn!(error = %e, "speech playback disabled");
                Arc::new(NullPlayback)
            }
        }
    } else {
        Arc::new(NullPlayback)
    };

    let recognizer = Arc::new(UnsupportedRecognizer);
    let options = SessionOptions {
        countdown_ticks: config.session.countdown_ticks,
        handoff_min_seconds: config.session.handoff_min_seconds,
        input_method: config.session.input,
        capture_available: config.voice.capture && recognizer.is_supported(),
        playback: playback.is_supported().then(|| PlaybackSettings {
            voice_id: Some(config.voice.voice_id.clone()),
            rate: config.voice.rate,
        }),
        first_speaker: config.first_speaker,
    };

    let store = SnapshotStore::default_path().map(SnapshotStore::new);

    let (session, effects) = match (cli.resume, &store) {
        (true, Some(store)) => match store.load()? {
            Some(snapshot) => Session::restore(snapshot, options)?,
            None => return Err("No unfinished session to resume.".into()),
        },
        (true, None) => return Err("No data directory available to resume from.".into()),
        (false, _) => {
            let title = cli.topic.clone().unwrap_or_default();
            let mut topic = Topic::new(
                "cli",
                title.clone(),
                cli.pro.clone().unwrap_or_else(|| format!("{} - yes", title)),
                cli.con.clone().unwrap_or_else(|| format!("{} - no", title)),
            );
            if let Some(background) = &cli.background {
                topic = topic.with_background(background.clone());
            }
            Session::initialize(
                SessionSetup {
                    topic,
                    user_stance: cli.stance,
                    difficulty: cli.difficulty,
                    config: config.durations,
                    mode: cli.mode,
                },
                options,
            )
        }
    };

    print_header(&session);

    let mut orchestrator = DebateOrchestrator::new(session, effects, Arc::new(debater), Arc::new(judge))
        .with_recognizer(recognizer)
        .with_playback(playback)
        .with_timings(Timings::from(&config.session))
        .with_callback(create_console_callback());
    if let Some(store) = store {
        orchestrator = orchestrator.with_snapshot_store(store);
    }

    let handle = orchestrator.handle();
    tokio::spawn(read_commands(handle));

    let report = orchestrator.run().await?;
    print_report(&report);

    Ok(())
}

/// Debater and judge keys, each falling back to `OPENAI_API_KEY`.
fn api_key(var: &str) -> String {
    env::var(var)
        .or_else(|_| env::var("OPENAI_API_KEY"))
        .unwrap_or_else(|_| {
            eprintln!(
                "{}",
                format!("Warning: neither {} nor OPENAI_API_KEY is set. API calls may fail.", var).yellow()
            );
            String::new()
        })
}

/// Map stdin lines onto the session.
async fn read_commands(handle: SessionHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let result = match line.trim() {
            "/pause" => handle.pause(),
            "/resume" => handle.resume(),
            "/skip" => handle.skip(),
            "/voice" => handle.set_input_method(InputMethod::Voice),
            "/text" => handle.set_input_method(InputMethod::Text),
            "/done" => handle.submit_voice(),
            _ => handle.submit_text(line.clone()),
        };
        if result.is_err() {
            break;
        }
    }
}

fn print_header(session: &Session) {
    let topic = session.topic();
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {}", "Sparring".bold(), session.mode().display_name())
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), topic.title.bright_white());
    println!("{} {}", "Pro:".bold(), topic.pro_position);
    println!("{} {}", "Con:".bold(), topic.con_position);
    println!(
        "{} {}",
        "You argue:".bold(),
        session.user_stance().display_name().bright_cyan()
    );
    println!();
    println!("{}", "Stages:".bold());
    for (i, stage) in session.stages().iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            stage.display_name,
            format!("({})", format_time(stage.time_limit)).dimmed()
        );
    }
    println!();
    println!(
        "{}",
        "Type a line and press Enter to speak. Commands: /pause /resume /skip /voice /text /done".dimmed()
    );
    println!("{}", "─".repeat(70).dimmed());
}

/// Create a callback that prints debate events to the console.
fn create_console_callback() -> DebateCallback {
    Box::new(move |event| match event {
        DebateEvent::CountdownTick { remaining } => {
            if remaining > 0 {
                println!("{}", format!("  Starting in {}...", remaining).bright_yellow());
            }
        }
        DebateEvent::StageStarted { index, total, stage } => {
            println!();
            println!("{}", "═".repeat(70).bright_magenta());
            println!(
                "{}",
                format!("  [{}/{}] {}", index + 1, total, stage.display_name)
                    .bright_magenta()
                    .bold()
            );
            println!("  {}", stage.description.dimmed());
            println!("{}", "═".repeat(70).bright_magenta());
        }
        DebateEvent::TurnStarted {
            side,
            time_remaining,
            ..
        } => {
            let who = match side {
                Side::User => "Your turn".bright_cyan().bold(),
                Side::Ai => "AI opponent".bright_red().bold(),
            };
            println!();
            println!("{} {} {}", "▶".bright_cyan(), who, format!("({})", format_time(time_remaining)).dimmed());
        }
        DebateEvent::TimeWarning(threshold) => {
            let label = match threshold {
                Threshold::ThirtySeconds => "30 seconds left",
                Threshold::TenSeconds => "10 seconds left",
            };
            println!("{}", format!("  ⏱ {}", label).yellow().bold());
        }
        DebateEvent::TimeRemaining { .. } => {}
        DebateEvent::AiFragment { text } => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        DebateEvent::MessageAdded(message) => {
            if message.speaker == Side::Ai {
                println!();
            }
        }
        DebateEvent::GenerationFailed { reason } => {
            println!("{}", format!("  AI response failed: {}", reason).red());
        }
        DebateEvent::Paused { .. } => println!("{}", "  ⏸ Paused. /resume to continue.".yellow()),
        DebateEvent::Resumed { .. } => println!("{}", "  ▶ Resumed.".green()),
        DebateEvent::InputMethodChanged(method) => {
            let label = match method {
                InputMethod::Voice => "voice",
                InputMethod::Text => "text",
            };
            println!("{}", format!("  Input method: {}", label).dimmed());
        }
        DebateEvent::ScoringStarted => {
            println!();
            println!("{}", "  The judge is scoring the debate...".bright_blue());
        }
        DebateEvent::DebateEnd { .. } => {
            // Handled in main
        }
    })
}

fn print_report(report: &JudgeReport) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    let verdict = match report.winner {
        Winner::User => "  You win!".bright_green().bold(),
        Winner::Ai => "  The AI wins.".bright_red().bold(),
        Winner::Tie => "  It's a tie.".bright_yellow().bold(),
    };
    println!("{}", verdict);
    println!("{}", "═".repeat(70).bright_blue());

    if report.fallback {
        println!("{}", "  (Placeholder scores: judging failed.)".yellow());
    }

    match &report.scores {
        ScoreCard::Standard { user, ai } => {
            println!("  {:<20} {:>8} {:>8}", "", "You", "AI");
            let rows = [
                ("Total", user.total, ai.total),
                ("Argument quality", user.argument_quality, ai.argument_quality),
                ("Logic", user.logic, ai.logic),
                ("Rebuttal", user.rebuttal, ai.rebuttal),
                ("Evidence", user.evidence, ai.evidence),
                ("Expression", user.expression, ai.expression),
            ];
            for (name, u, a) in rows {
                println!("  {:<20} {:>8.1} {:>8.1}", name, u, a);
            }
        }
        ScoreCard::Emotional { user, ai } => {
            println!("  {:<20} {:>8} {:>8}", "", "You", "AI");
            let rows = [
                ("Total", user.total, ai.total),
                ("Emotion intensity", user.emotion_intensity, ai.emotion_intensity),
                ("Logic & reasoning", user.logic_reasoning, ai.logic_reasoning),
                ("Blend quality", user.blend_quality, ai.blend_quality),
            ];
            for (name, u, a) in rows {
                println!("  {:<20} {:>8.1} {:>8.1}", name, u, a);
            }
        }
    }

    println!();
    for line in textwrap(&report.overall_comment, 66).lines() {
        println!("  {}", line);
    }

    print_list("Highlights", &report.user_highlights);
    print_list("To improve", &report.user_improvements);

    if !report.key_moments.is_empty() {
        println!();
        println!("{}", "Key moments:".bold());
        for moment in &report.key_moments {
            let marker = match moment.impact {
                Impact::Positive => "+".green(),
                Impact::Negative => "-".red(),
                Impact::Neutral => "·".dimmed(),
            };
            println!("  {} [{}] {}", marker, moment.stage, moment.description);
        }
    }
    println!();
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{}", format!("{}:", title).bold());
    for item in items {
        let wrapped = textwrap(item, 62);
        let mut lines = wrapped.lines();
        if let Some(first) = lines.next() {
            println!("  • {}", first);
        }
        for line in lines {
            println!("    {}", line);
        }
    }
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
