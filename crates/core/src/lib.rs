//! Core types and traits for the call agent
//!
//! This crate provides foundational types used across all other crates:
//! - Call identity, phases and outcomes
//! - Scenario and objection document models (shared read-only via the cache)
//! - Intent labels and classification results
//! - Collaborator traits (transport, transcription, voice activity, sentiment)
//! - Error types for the collaborator boundary

pub mod audio;
pub mod call;
pub mod error;
pub mod intent;
pub mod objection;
pub mod scenario;
pub mod traits;
pub mod transcript;

pub use audio::AudioRef;
pub use call::{CallId, CallOutcome, CallPhase, HangupOrigin, TurnRecord, TurnRole};
pub use error::{SentimentError, TranscribeError, TransportError};
pub use intent::{ClassifyStage, IntentLabel, IntentResult};
pub use objection::{ObjectionEntry, ObjectionKind, ObjectionSet, GENERAL_THEME};
pub use scenario::{
    AudioKind, ScenarioDefinition, ScenarioMetadata, StepConfig, END_STEP, WILDCARD_INTENT,
};
pub use transcript::TranscriptResult;

pub use traits::{
    CallTransport, RecordingInfo, SentimentAnalyzer, SentimentLabel, SentimentResult, Transcriber,
    TransportEvent, VoiceActivity, VoiceActivityProbe,
};
