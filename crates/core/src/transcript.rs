//! Transcription results

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of transcribing one capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Recognized text, empty when nothing was understood
    pub text: String,
    /// Backend confidence in [0, 1]
    pub confidence: f32,
    /// Duration of the audio that was transcribed
    pub duration: Duration,
}

impl TranscriptResult {
    pub fn new(text: impl Into<String>, confidence: f32, duration: Duration) -> Self {
        Self {
            text: text.into(),
            confidence,
            duration,
        }
    }

    /// An empty transcript, used when a capture is treated as silence
    pub fn silence() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            duration: Duration::ZERO,
        }
    }

    /// True when there is no usable text
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_empty() {
        assert!(TranscriptResult::silence().is_empty());
        assert!(TranscriptResult::new("   ", 0.9, Duration::from_secs(1)).is_empty());
        assert!(!TranscriptResult::new("oui", 0.9, Duration::from_secs(1)).is_empty());
    }
}
