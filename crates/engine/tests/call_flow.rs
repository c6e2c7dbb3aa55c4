//! End-to-end call flows against a scripted transport
//!
//! The mock telco answers immediately, plays back scripted caller replies
//! through the recording/transcription path, and reports voice activity
//! matching the script. Tests run under a paused clock so every phase
//! timeout elapses instantly.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use call_agent_config::Settings;
use call_agent_core::{
    AudioRef, CallId, CallOutcome, CallTransport, HangupOrigin, RecordingInfo, TranscribeError,
    Transcriber, TranscriptResult, TransportError, TransportEvent, VoiceActivity,
    VoiceActivityProbe,
};
use call_agent_engine::{CallEngine, EngineError};

/// Samples of speech reported per scripted (non-silent) reply window
const SPEECH_SAMPLES: u32 = 15;

struct TelcoInner {
    events: mpsc::Sender<TransportEvent>,
    /// First transcription of a call: the pickup greeting
    greeting: String,
    /// Scripted caller replies; `None` is a silent turn
    replies: Mutex<VecDeque<Option<String>>>,
    /// Recordings started so far (the first one is the AMD sample)
    recordings: AtomicU32,
    /// Probe samples taken in the current listen window
    window_samples: AtomicU32,
    /// Transcript staged by the last stop_recording
    pending: Mutex<Option<String>>,
    /// Hang up from the caller side once the script runs dry
    hangup_when_empty: bool,
}

/// Scripted PBX + transcriber + voice-activity probe
#[derive(Clone)]
struct MockTelco {
    inner: Arc<TelcoInner>,
}

impl MockTelco {
    fn new(
        events: mpsc::Sender<TransportEvent>,
        greeting: &str,
        replies: &[Option<&str>],
        hangup_when_empty: bool,
    ) -> Self {
        Self {
            inner: Arc::new(TelcoInner {
                events,
                greeting: greeting.to_string(),
                replies: Mutex::new(
                    replies
                        .iter()
                        .map(|r| r.map(|s| s.to_string()))
                        .collect(),
                ),
                recordings: AtomicU32::new(0),
                window_samples: AtomicU32::new(0),
                pending: Mutex::new(None),
                hangup_when_empty,
            }),
        }
    }

    fn is_amd_window(&self) -> bool {
        self.inner.recordings.load(Ordering::SeqCst) <= 1
    }
}

#[async_trait]
impl CallTransport for MockTelco {
    async fn originate(&self, call: &CallId, _dest: &str) -> Result<(), TransportError> {
        let _ = self
            .inner
            .events
            .send(TransportEvent::Answered { call: call.clone() })
            .await;
        Ok(())
    }

    async fn play(&self, _call: &CallId, _audio: &AudioRef) -> Result<(), TransportError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    }

    async fn stop_playback(&self, _call: &CallId) -> Result<(), TransportError> {
        Ok(())
    }

    async fn start_recording(
        &self,
        call: &CallId,
        _target: &AudioRef,
    ) -> Result<(), TransportError> {
        let n = self.inner.recordings.fetch_add(1, Ordering::SeqCst);
        self.inner.window_samples.store(0, Ordering::SeqCst);
        // Caller hangs up instead of answering once the script is exhausted
        if n >= 1 && self.inner.hangup_when_empty && self.inner.replies.lock().is_empty() {
            let _ = self
                .inner
                .events
                .try_send(TransportEvent::HangupCompleted { call: call.clone() });
        }
        Ok(())
    }

    async fn stop_recording(&self, _call: &CallId) -> Result<RecordingInfo, TransportError> {
        let (text, duration) = if self.is_amd_window() {
            (self.inner.greeting.clone(), Duration::from_millis(3_500))
        } else {
            let reply = self.inner.replies.lock().pop_front().flatten();
            (reply.unwrap_or_default(), Duration::from_secs(2))
        };
        *self.inner.pending.lock() = Some(text);
        Ok(RecordingInfo {
            audio: AudioRef::new("capture.wav"),
            duration,
        })
    }

    async fn hangup(&self, call: &CallId) -> Result<(), TransportError> {
        let _ = self
            .inner
            .events
            .send(TransportEvent::HangupCompleted { call: call.clone() })
            .await;
        Ok(())
    }
}

#[async_trait]
impl Transcriber for MockTelco {
    async fn transcribe(&self, _audio: &AudioRef) -> Result<TranscriptResult, TranscribeError> {
        let text = self.inner.pending.lock().take().unwrap_or_default();
        Ok(TranscriptResult::new(text, 0.92, Duration::from_secs(2)))
    }
}

#[async_trait]
impl VoiceActivityProbe for MockTelco {
    async fn sample(&self, _call: &CallId) -> Result<VoiceActivity, TransportError> {
        let n = self.inner.window_samples.fetch_add(1, Ordering::SeqCst);
        let speaking = n < SPEECH_SAMPLES
            && self
                .inner
                .replies
                .lock()
                .front()
                .map(|r| r.as_deref().map_or(false, |s| !s.is_empty()))
                .unwrap_or(false);
        Ok(if speaking {
            VoiceActivity::speech(0.9)
        } else {
            VoiceActivity::silence()
        })
    }
}

/// Three-question rail; only the last question qualifies
const RAIL_SCENARIO: &str = r#"{
    "name": "rail3",
    "metadata": {"voice": "fr-1", "theme": "finance", "barge_in": false, "rail": ["q1", "q2", "q3"]},
    "variables": {},
    "entry_step": "q1",
    "steps": {
        "q1": {
            "message": "Première question ?",
            "audio_type": "audio",
            "audio_ref": "prompts/q1.wav",
            "intents": {"*": "end"}
        },
        "q2": {
            "message": "Deuxième question ?",
            "audio_type": "audio",
            "audio_ref": "prompts/q2.wav",
            "intents": {"*": "end"}
        },
        "q3": {
            "message": "Dernière question ?",
            "audio_type": "audio",
            "audio_ref": "prompts/q3.wav",
            "qualifying": true,
            "qualification_weight": 100,
            "intents": {"*": "end"}
        }
    }
}"#;

/// Single step with the objection loop enabled
const OBJECTION_SCENARIO: &str = r#"{
    "name": "pitch",
    "metadata": {"voice": "fr-1", "theme": "finance", "barge_in": false},
    "variables": {},
    "entry_step": "pitch",
    "steps": {
        "pitch": {
            "message": "Notre offre vous intéresse ?",
            "audio_type": "audio",
            "audio_ref": "prompts/pitch.wav",
            "max_autonomous_turns": 2,
            "intents": {"*": "end"}
        }
    }
}"#;

const OBJECTIONS_GENERAL: &str = r#"[
    {"keywords": ["trop cher", "cher"], "response": "Le prix se discute.", "kind": "objection"}
]"#;

struct Fixture {
    _dir: tempfile::TempDir,
    engine: CallEngine,
    reports: mpsc::UnboundedReceiver<call_agent_engine::CallReport>,
}

fn fixture(telco: &MockTelco, events: mpsc::Receiver<TransportEvent>, scenario: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let scenario_dir = dir.path().join("scenarios");
    let objection_dir = dir.path().join("objections");
    std::fs::create_dir_all(&scenario_dir).unwrap();
    std::fs::create_dir_all(&objection_dir).unwrap();

    let name: serde_json::Value = serde_json::from_str(scenario).unwrap();
    let file = scenario_dir.join(format!("{}.json", name["name"].as_str().unwrap()));
    std::fs::File::create(file)
        .unwrap()
        .write_all(scenario.as_bytes())
        .unwrap();
    std::fs::File::create(objection_dir.join("general.json"))
        .unwrap()
        .write_all(OBJECTIONS_GENERAL.as_bytes())
        .unwrap();
    std::fs::File::create(objection_dir.join("finance.json"))
        .unwrap()
        .write_all(b"[]")
        .unwrap();

    let mut settings = Settings::default();
    settings.engine.scenario_dir = scenario_dir.display().to_string();
    settings.engine.objection_dir = objection_dir.display().to_string();
    settings.engine.shutdown_grace_secs = 5;

    let engine = CallEngine::new(
        Arc::new(telco.clone()),
        Arc::new(telco.clone()),
        Arc::new(telco.clone()),
        None,
        events,
        settings,
    );
    let reports = engine.reports().unwrap();
    Fixture {
        _dir: dir,
        engine,
        reports,
    }
}

#[tokio::test(start_paused = true)]
async fn test_rail_ending_in_deny_is_not_interested() {
    let (tx, rx) = mpsc::channel(64);
    let telco = MockTelco::new(
        tx,
        "allô bonjour",
        &[Some("oui"), Some("oui"), Some("non")],
        false,
    );
    let mut fx = fixture(&telco, rx, RAIL_SCENARIO);

    fx.engine.place_call("+33600000001", "rail3").unwrap();
    let report = fx.reports.recv().await.unwrap();

    assert_eq!(report.outcome, CallOutcome::NotInterested);
    assert_eq!(report.hangup_origin, HangupOrigin::Robot);
    assert!(!report.qualified);
    // q3 was visited and denied
    assert_eq!(report.visited_qualifying_weight, 100.0);
    assert_eq!(report.qualification_score, 0.0);
    assert_eq!(fx.engine.active_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_all_affirmative_rail_is_a_lead() {
    let (tx, rx) = mpsc::channel(64);
    let telco = MockTelco::new(
        tx,
        "allô bonjour",
        &[Some("oui"), Some("oui"), Some("oui bien sûr")],
        false,
    );
    let mut fx = fixture(&telco, rx, RAIL_SCENARIO);

    fx.engine.place_call("+33600000002", "rail3").unwrap();
    let report = fx.reports.recv().await.unwrap();

    assert_eq!(report.outcome, CallOutcome::Lead);
    assert!(report.qualified);
    assert_eq!(report.qualification_score, 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_machine_pickup_is_no_answer() {
    let (tx, rx) = mpsc::channel(64);
    let telco = MockTelco::new(
        tx,
        "vous êtes sur le répondeur de Jean, laissez un message",
        &[],
        false,
    );
    let mut fx = fixture(&telco, rx, RAIL_SCENARIO);

    fx.engine.place_call("+33600000003", "rail3").unwrap();
    let report = fx.reports.recv().await.unwrap();

    assert_eq!(report.outcome, CallOutcome::NoAnswer);
    assert_eq!(report.hangup_origin, HangupOrigin::Robot);
    // The conversation never started
    assert!(report.journal.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_objection_resolved_in_loop() {
    let (tx, rx) = mpsc::channel(64);
    let telco = MockTelco::new(
        tx,
        "allô bonjour",
        &[Some("c'est trop cher"), Some("d'accord")],
        false,
    );
    let mut fx = fixture(&telco, rx, OBJECTION_SCENARIO);

    fx.engine.place_call("+33600000004", "pitch").unwrap();
    let report = fx.reports.recv().await.unwrap();

    assert_eq!(report.outcome, CallOutcome::Completed);
    // The rebuttal from the general dataset was played
    assert!(report
        .journal
        .iter()
        .any(|t| t.text == "Le prix se discute."));
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_silence_forces_not_interested() {
    let (tx, rx) = mpsc::channel(64);
    let telco = MockTelco::new(tx, "allô bonjour", &[None, None, None], false);
    let mut fx = fixture(&telco, rx, RAIL_SCENARIO);

    fx.engine.place_call("+33600000005", "rail3").unwrap();
    let report = fx.reports.recv().await.unwrap();

    assert_eq!(report.outcome, CallOutcome::NotInterested);
    assert_eq!(report.hangup_origin, HangupOrigin::Robot);
}

#[tokio::test(start_paused = true)]
async fn test_caller_hangup_mid_call_defaults_to_not_interested() {
    let (tx, rx) = mpsc::channel(64);
    let telco = MockTelco::new(tx, "allô bonjour", &[Some("oui")], true);
    let mut fx = fixture(&telco, rx, RAIL_SCENARIO);

    fx.engine.place_call("+33600000006", "rail3").unwrap();
    let report = fx.reports.recv().await.unwrap();

    assert_eq!(report.outcome, CallOutcome::NotInterested);
    assert_eq!(report.hangup_origin, HangupOrigin::Caller);
}

#[tokio::test(start_paused = true)]
async fn test_capacity_and_shutdown() {
    let (tx, rx) = mpsc::channel(64);
    let telco = MockTelco::new(tx, "allô bonjour", &[Some("oui")], false);

    let dir = tempfile::tempdir().unwrap();
    let scenario_dir = dir.path().join("scenarios");
    std::fs::create_dir_all(&scenario_dir).unwrap();
    std::fs::File::create(scenario_dir.join("rail3.json"))
        .unwrap()
        .write_all(RAIL_SCENARIO.as_bytes())
        .unwrap();

    let mut settings = Settings::default();
    settings.engine.scenario_dir = scenario_dir.display().to_string();
    settings.engine.objection_dir = dir.path().display().to_string();
    settings.engine.max_concurrent_calls = 1;

    let engine = CallEngine::new(
        Arc::new(telco.clone()),
        Arc::new(telco.clone()),
        Arc::new(telco.clone()),
        None,
        rx,
        settings,
    );

    engine.place_call("+33600000007", "rail3").unwrap();
    assert!(matches!(
        engine.place_call("+33600000008", "rail3"),
        Err(EngineError::AtCapacity { .. })
    ));

    engine.shutdown().await;
    assert_eq!(engine.active_calls(), 0);
    assert!(matches!(
        engine.place_call("+33600000009", "rail3"),
        Err(EngineError::ShuttingDown)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_scenario_refused_before_dialing() {
    let (tx, rx) = mpsc::channel(64);
    let telco = MockTelco::new(tx, "allô bonjour", &[], false);
    let fx = fixture(&telco, rx, RAIL_SCENARIO);

    assert!(matches!(
        fx.engine.place_call("+33600000010", "missing"),
        Err(EngineError::Scenario(_))
    ));
    assert_eq!(fx.engine.active_calls(), 0);
}
