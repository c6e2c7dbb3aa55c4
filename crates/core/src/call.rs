//! Call identity, lifecycle phases and terminal outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::IntentLabel;
use crate::traits::SentimentResult;

/// Unique identifier of one telephone call
///
/// Wraps the transport-side channel identifier. For outbound calls the engine
/// mints one before origination so every command and event can be correlated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(String);

impl CallId {
    /// Mint a fresh call id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a transport-provided channel identifier
    pub fn from_channel(channel: impl Into<String>) -> Self {
        Self(channel.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle phase of a call
///
/// Within one call, phases are strictly sequential; the orchestrator never
/// runs two phases concurrently for the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    /// Call created, not yet answered
    #[default]
    Init,
    /// Answering-machine detection on the first seconds of the call
    Amd,
    /// Playing a prompt (possibly with a barge-in monitor alongside)
    Playing,
    /// Recording and waiting for the caller's reply
    Waiting,
    /// Autonomous objection-handling sub-loop within a step
    ObjectionLoop,
    /// Outcome decided, hangup in flight
    Finalizing,
}

/// Terminal outcome of a call
///
/// Every call terminates in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallOutcome {
    /// Conversation ran to its end without qualifying
    Completed,
    /// Caller declined, hung up mid-conversation, or failed the flow
    NotInterested,
    /// Caller qualified as a lead
    Lead,
    /// Machine pickup, ring timeout, or origination failure
    NoAnswer,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Completed => "COMPLETED",
            CallOutcome::NotInterested => "NOT_INTERESTED",
            CallOutcome::Lead => "LEAD",
            CallOutcome::NoAnswer => "NO_ANSWER",
        }
    }
}

/// Who ended the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HangupOrigin {
    /// The engine pre-registered the hangup with its intended outcome
    Robot,
    /// The caller (or the carrier) dropped the call
    Caller,
}

/// Speaker role of one journal turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Agent,
    Caller,
}

/// One entry of the per-call turn journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub role: TurnRole,
    pub text: String,
    /// Classified intent, for caller turns
    pub intent: Option<IntentLabel>,
    /// Sentiment of the utterance when an analyzer is configured
    pub sentiment: Option<SentimentResult>,
    pub at: DateTime<Utc>,
}

impl TurnRecord {
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Agent,
            text: text.into(),
            intent: None,
            sentiment: None,
            at: Utc::now(),
        }
    }

    pub fn caller(text: impl Into<String>, intent: IntentLabel) -> Self {
        Self {
            role: TurnRole::Caller,
            text: text.into(),
            intent: Some(intent),
            sentiment: None,
            at: Utc::now(),
        }
    }
}
