//! End-to-end runs of the orchestrator against scripted collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use sparring_core::ai_stream::{Debater, DebaterRequest, FragmentStream};
use sparring_core::error::{GenerationError, JudgeError};
use sparring_core::judge::{Judge, JudgeReport, JudgeRequest, Winner, fallback_report};
use sparring_core::prompt::CONTINUATION_INSTRUCTION;
use sparring_core::session::{DebateEvent, Session, SessionOptions, SessionSetup};
use sparring_core::{
    DebateConfig, DebateMode, DebateOrchestrator, Difficulty, SessionHandle, Side, Stance, Topic,
};

struct ScriptedDebater {
    fragments: Vec<&'static str>,
    delay: Duration,
    fail: bool,
    requests: Mutex<Vec<DebaterRequest>>,
}

impl ScriptedDebater {
    fn new(fragments: Vec<&'static str>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fragments,
            delay,
            fail: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fragments: vec!["Partial "],
            delay: Duration::from_millis(50),
            fail: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<DebaterRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Debater for ScriptedDebater {
    async fn open(&self, request: DebaterRequest) -> Result<FragmentStream, GenerationError> {
        self.requests.lock().unwrap().push(request);
        let mut items: Vec<Result<String, GenerationError>> =
            self.fragments.iter().map(|f| Ok(f.to_string())).collect();
        if self.fail {
            items.push(Err(GenerationError::Api("connection reset".into())));
        }
        let delay = self.delay;
        Ok(stream::iter(items)
            .then(move |item| async move {
                tokio::time::sleep(delay).await;
                item
            })
            .boxed())
    }
}

struct StubJudge {
    fail: bool,
    calls: AtomicUsize,
}

impl StubJudge {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Judge for StubJudge {
    async fn judge(&self, request: JudgeRequest) -> Result<JudgeReport, JudgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        if self.fail {
            return Err(JudgeError::Api("network error".into()));
        }
        assert!(request.transcript.starts_with("Topic: School uniforms should be mandatory"));
        let mut report = fallback_report(request.mode, "");
        report.fallback = false;
        report.winner = Winner::User;
        report.overall_comment = "Well argued.".into();
        Ok(report)
    }
}

fn setup(mode: DebateMode, stance: Stance) -> SessionSetup {
    SessionSetup {
        topic: Topic::new(
            "uniforms",
            "School uniforms should be mandatory",
            "Uniforms help",
            "Uniforms hurt",
        ),
        user_stance: stance,
        difficulty: Difficulty::Intermediate,
        config: DebateConfig {
            opening: 20,
            cross_exam: 15,
            free_debate: 10,
            closing: 12,
            prep: 5,
            emotional_total: 60,
        },
        mode,
    }
}

type Recorded = Arc<Mutex<Vec<DebateEvent>>>;

/// Record every event and let `react` drive the session.
fn orchestrator<F>(
    mode: DebateMode,
    stance: Stance,
    debater: Arc<ScriptedDebater>,
    judge: Arc<StubJudge>,
    react: F,
) -> (DebateOrchestrator, Recorded)
where
    F: Fn(&DebateEvent, &SessionHandle) + Send + Sync + 'static,
{
    let (session, effects) = Session::initialize(setup(mode, stance), SessionOptions::default());
    let orchestrator = DebateOrchestrator::new(session, effects, debater, judge);
    let handle = orchestrator.handle();
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    let orchestrator = orchestrator.with_callback(Box::new(move |event| {
        react(&event, &handle);
        sink.lock().unwrap().push(event);
    }));
    (orchestrator, recorded)
}

fn submit_on_user_turn(event: &DebateEvent, handle: &SessionHandle) {
    if let DebateEvent::TurnStarted { side: Side::User, .. } = event {
        handle.submit_text("Uniforms remove visible inequality.").unwrap();
    }
}

fn messages(recorded: &Recorded) -> Vec<(Side, String)> {
    recorded
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            DebateEvent::MessageAdded(m) => Some((m.speaker, m.content.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_emotional_session_runs_to_completion() {
    let debater = ScriptedDebater::new(vec!["That ", "is ", "naive."], Duration::from_millis(100));
    let judge = StubJudge::new(false);
    let (orchestrator, recorded) = orchestrator(
        DebateMode::Emotional,
        Stance::Pro,
        debater.clone(),
        judge.clone(),
        submit_on_user_turn,
    );

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.winner, Winner::User);
    assert!(!report.fallback);
    assert_eq!(report.mode(), DebateMode::Emotional);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 1);

    let messages = messages(&recorded);
    let speakers: Vec<Side> = messages.iter().map(|(s, _)| *s).collect();
    assert_eq!(speakers, vec![Side::User, Side::Ai, Side::User]);
    assert_eq!(messages[1].1, "That is naive.");

    let events = recorded.lock().unwrap();
    assert!(matches!(events.last(), Some(DebateEvent::DebateEnd { .. })));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, DebateEvent::CountdownTick { .. }))
            .count(),
        4
    );
}

#[tokio::test(start_paused = true)]
async fn test_standard_session_with_silent_user_and_failing_judge() {
    let debater = ScriptedDebater::new(vec!["Point one. ", "Point two."], Duration::from_millis(100));
    let judge = StubJudge::new(true);
    let (orchestrator, recorded) = orchestrator(
        DebateMode::Standard,
        Stance::Pro,
        debater.clone(),
        judge,
        |_, _| {},
    );

    let report = orchestrator.run().await.unwrap();

    assert!(report.fallback);
    assert_eq!(report.winner, Winner::Tie);
    let (user, ai) = report.scores.totals();
    assert_eq!(user, ai);

    // The user never spoke; every AI-owned turn produced one message.
    let messages = messages(&recorded);
    assert!(messages.iter().all(|(side, _)| *side == Side::Ai));
    assert_eq!(messages.len(), debater.requests().len());

    let stages_started = recorded
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, DebateEvent::StageStarted { .. }))
        .count();
    assert_eq!(stages_started, 7);
}

#[tokio::test(start_paused = true)]
async fn test_pause_mid_generation_keeps_partial_and_continues_on_resume() {
    let debater = ScriptedDebater::new(
        vec!["Alpha ", "beta ", "gamma ", "delta."],
        Duration::from_millis(1000),
    );
    let judge = StubJudge::new(false);
    let paused_once = Arc::new(AtomicBool::new(false));

    let (orchestrator, recorded) = orchestrator(
        DebateMode::Standard,
        Stance::Con,
        debater.clone(),
        judge,
        move |event, handle| match event {
            DebateEvent::AiFragment { .. } => {
                if !paused_once.swap(true, Ordering::SeqCst) {
                    handle.pause().unwrap();
                }
            }
            DebateEvent::Paused { .. } => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    handle.resume().unwrap();
                });
            }
            other => submit_on_user_turn(other, handle),
        },
    );

    orchestrator.run().await.unwrap();

    let messages = messages(&recorded);
    assert_eq!(messages[0], (Side::Ai, "Alpha".to_string()));
    assert_eq!(messages[1], (Side::Ai, "Alpha beta gamma delta.".to_string()));

    let requests = debater.requests();
    let resumed = &requests[1];
    assert_eq!(resumed.history.len(), 2);
    assert_eq!(resumed.history[1].content, CONTINUATION_INSTRUCTION);

    let events = recorded.lock().unwrap();
    let fragments_after_pause = events
        .iter()
        .skip_while(|e| !matches!(e, DebateEvent::Paused { .. }))
        .take_while(|e| !matches!(e, DebateEvent::Resumed { .. }))
        .filter(|e| matches!(e, DebateEvent::AiFragment { .. } | DebateEvent::TimeRemaining { .. }))
        .count();
    assert_eq!(fragments_after_pause, 0);
}

#[tokio::test(start_paused = true)]
async fn test_generation_failure_is_recorded_and_debate_continues() {
    let debater = ScriptedDebater::failing();
    let judge = StubJudge::new(false);
    let (orchestrator, recorded) = orchestrator(
        DebateMode::Standard,
        Stance::Con,
        debater,
        judge,
        submit_on_user_turn,
    );

    let report = orchestrator.run().await.unwrap();
    assert!(!report.fallback);

    let messages = messages(&recorded);
    assert_eq!(messages[0], (Side::Ai, "Partial".to_string()));
    assert!(messages[1].1.starts_with("[AI response failed:"));
    assert!(messages[1].1.contains("connection reset"));
    assert_eq!(messages[2].0, Side::User);
}
