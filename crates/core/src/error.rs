//! Errors at the collaborator boundary
//!
//! The taxonomy matters more than the payloads: a `TransportError` is fatal
//! for its call only; a `TranscribeError` degrades to silence; sentiment
//! failures are logged and dropped. Scenario validation errors live in the
//! scenario crate next to the validator.

use thiserror::Error;

/// Failure of a transport command or of the control channel itself
///
/// Fatal for the affected call; never for the process or for other calls.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("transport command {command} failed: {message}")]
    Command { command: &'static str, message: String },

    #[error("transport event channel closed")]
    ChannelClosed,

    #[error("no such call on the transport: {0}")]
    UnknownCall(String),

    #[error("transport timed out waiting for {0}")]
    Timeout(&'static str),
}

impl TransportError {
    pub fn command(command: &'static str, message: impl Into<String>) -> Self {
        Self::Command {
            command,
            message: message.into(),
        }
    }
}

/// Failure of the transcription collaborator
///
/// Treated as an empty transcript, never as a call-fatal condition.
#[derive(Error, Debug, Clone)]
pub enum TranscribeError {
    #[error("transcription backend error: {0}")]
    Backend(String),

    #[error("transcription timed out")]
    Timeout,
}

/// Failure of the optional sentiment collaborator
///
/// Always ignored by the call flow; only logged.
#[derive(Error, Debug, Clone)]
pub enum SentimentError {
    #[error("sentiment backend error: {0}")]
    Backend(String),
}
