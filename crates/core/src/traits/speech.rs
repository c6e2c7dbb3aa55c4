//! Transcription and voice-activity collaborator traits

use async_trait::async_trait;

use crate::audio::AudioRef;
use crate::call::CallId;
use crate::error::{TranscribeError, TransportError};
use crate::transcript::TranscriptResult;

/// Opaque speech-to-text backend
///
/// May be slow or CPU-bound; the engine always awaits it with a timeout and
/// maps empty or failed results to silence.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioRef) -> Result<TranscriptResult, TranscribeError>;
}

/// One voice-activity observation for a call
///
/// Produced by a frame-based classifier in the transport's audio path, not
/// inferred from capture-file growth.
#[derive(Debug, Clone, Copy)]
pub struct VoiceActivity {
    /// Whether the current frame window is classified as speech
    pub speaking: bool,
    /// Speech probability in [0, 1]
    pub probability: f32,
}

impl VoiceActivity {
    pub fn speech(probability: f32) -> Self {
        Self {
            speaking: true,
            probability,
        }
    }

    pub fn silence() -> Self {
        Self {
            speaking: false,
            probability: 0.0,
        }
    }
}

/// Live voice-activity source sampled by the barge-in monitor and the
/// waiting-phase silence detector
#[async_trait]
pub trait VoiceActivityProbe: Send + Sync {
    /// Snapshot of the caller's current voice activity
    async fn sample(&self, call: &CallId) -> Result<VoiceActivity, TransportError>;
}
