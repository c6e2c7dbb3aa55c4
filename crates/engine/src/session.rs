//! Per-call session state
//!
//! A `CallSession` is exclusively owned by its orchestrating task; nothing
//! here is shared or locked. It dies with the call, leaving only the final
//! `CallReport`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use call_agent_config::LimitSettings;
use call_agent_core::{
    CallId, CallOutcome, CallPhase, HangupOrigin, IntentLabel, ScenarioDefinition, TurnRecord,
};
use call_agent_scenario::QualificationTracker;

/// State of one in-flight call
pub struct CallSession {
    pub id: CallId,
    pub phase: CallPhase,
    pub current_step: String,
    pub scenario: Arc<ScenarioDefinition>,
    pub qualification: QualificationTracker,
    /// Autonomous objection turns spent, per step
    pub autonomous_turns: HashMap<String, u32>,
    pub consecutive_silence: u32,
    pub consecutive_no_match: u32,
    /// Conversation journal, agent and caller turns interleaved
    pub journal: Vec<TurnRecord>,
    /// DTMF digits received, in order
    pub dtmf: Vec<char>,
    /// Last classified caller intent
    pub last_intent: Option<IntentLabel>,
    started_at: DateTime<Utc>,
}

impl CallSession {
    pub fn new(
        id: CallId,
        scenario: Arc<ScenarioDefinition>,
        entry_step: String,
        qualification_threshold: f32,
    ) -> Self {
        Self {
            id,
            phase: CallPhase::Init,
            current_step: entry_step,
            scenario,
            qualification: QualificationTracker::new(qualification_threshold),
            autonomous_turns: HashMap::new(),
            consecutive_silence: 0,
            consecutive_no_match: 0,
            journal: Vec::new(),
            dtmf: Vec::new(),
            last_intent: None,
            started_at: Utc::now(),
        }
    }

    /// Record a silent reply; returns true when the bound is reached
    pub fn note_silence(&mut self, limits: &LimitSettings) -> bool {
        self.consecutive_silence += 1;
        self.last_intent = Some(IntentLabel::Silence);
        self.consecutive_silence >= limits.max_consecutive_silence
    }

    /// Record an unmatched reply; returns true when the bound is reached
    pub fn note_no_match(&mut self, limits: &LimitSettings) -> bool {
        self.consecutive_no_match += 1;
        self.consecutive_silence = 0;
        self.consecutive_no_match >= limits.max_consecutive_no_match
    }

    /// Record an understood reply, resetting both failure counters
    pub fn note_understood(&mut self, intent: IntentLabel) {
        self.consecutive_silence = 0;
        self.consecutive_no_match = 0;
        self.last_intent = Some(intent);
    }

    /// Autonomous turns already spent on a step
    pub fn turns_spent(&self, step: &str) -> u32 {
        self.autonomous_turns.get(step).copied().unwrap_or(0)
    }

    /// Count one autonomous turn on a step
    pub fn spend_turn(&mut self, step: &str) {
        *self.autonomous_turns.entry(step.to_string()).or_insert(0) += 1;
    }

    pub fn push_turn(&mut self, turn: TurnRecord) {
        self.journal.push(turn);
    }

    /// Close the session into its final report
    pub fn into_report(self, outcome: CallOutcome, hangup_origin: HangupOrigin) -> CallReport {
        let duration_ms = (Utc::now() - self.started_at).num_milliseconds().max(0) as u64;
        CallReport {
            call: self.id,
            scenario: self.scenario.name.clone(),
            outcome,
            hangup_origin,
            qualification_score: self.qualification.score(),
            visited_qualifying_weight: self.qualification.visited_weight(),
            qualified: self.qualification.is_qualified(),
            journal: self.journal,
            dtmf: self.dtmf,
            duration_ms,
        }
    }
}

/// Immutable summary of a finished call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallReport {
    pub call: CallId,
    pub scenario: String,
    pub outcome: CallOutcome,
    pub hangup_origin: HangupOrigin,
    pub qualification_score: f32,
    pub visited_qualifying_weight: f32,
    pub qualified: bool,
    pub journal: Vec<TurnRecord>,
    pub dtmf: Vec<char>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::ScenarioMetadata;

    fn session() -> CallSession {
        let scenario = Arc::new(ScenarioDefinition {
            name: "demo".into(),
            metadata: ScenarioMetadata {
                voice: String::new(),
                theme: "general".into(),
                barge_in: false,
                rail: None,
            },
            variables: HashMap::new(),
            steps: HashMap::new(),
            entry_step: "intro".into(),
        });
        CallSession::new(CallId::new(), scenario, "intro".into(), 0.65)
    }

    #[test]
    fn test_silence_bound() {
        let limits = LimitSettings::default();
        let mut s = session();
        assert!(!s.note_silence(&limits));
        assert!(s.note_silence(&limits));
    }

    #[test]
    fn test_understood_resets_counters() {
        let limits = LimitSettings::default();
        let mut s = session();
        s.note_silence(&limits);
        s.note_no_match(&limits);
        s.note_understood(IntentLabel::Affirm);
        assert_eq!(s.consecutive_silence, 0);
        assert_eq!(s.consecutive_no_match, 0);
        assert_eq!(s.last_intent, Some(IntentLabel::Affirm));
    }

    #[test]
    fn test_autonomous_turns_per_step() {
        let mut s = session();
        s.spend_turn("q2");
        s.spend_turn("q2");
        s.spend_turn("q5");
        assert_eq!(s.turns_spent("q2"), 2);
        assert_eq!(s.turns_spent("q5"), 1);
        assert_eq!(s.turns_spent("q1"), 0);
    }

    #[test]
    fn test_report_carries_outcome() {
        let s = session();
        let report = s.into_report(CallOutcome::NotInterested, HangupOrigin::Robot);
        assert_eq!(report.outcome, CallOutcome::NotInterested);
        assert!(!report.qualified);
    }
}
