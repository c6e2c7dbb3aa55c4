//! Transport (PBX control channel) abstraction
//!
//! The transport exposes an imperative command surface and an asynchronous
//! event stream. Commands acknowledge success or failure; call progress
//! (answer, hangup, DTMF) arrives as events on an `mpsc` channel the engine
//! consumes and routes per call.

use async_trait::async_trait;
use std::time::Duration;

use crate::audio::AudioRef;
use crate::call::CallId;
use crate::error::TransportError;

/// Asynchronous call-progress event from the PBX
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The remote party picked up
    Answered { call: CallId },
    /// The call is down; emitted for robot- and caller-initiated hangups alike
    HangupCompleted { call: CallId },
    /// A DTMF digit was pressed
    Dtmf { call: CallId, digit: char },
}

impl TransportEvent {
    /// Call the event belongs to
    pub fn call(&self) -> &CallId {
        match self {
            TransportEvent::Answered { call } => call,
            TransportEvent::HangupCompleted { call } => call,
            TransportEvent::Dtmf { call, .. } => call,
        }
    }
}

/// Result of stopping a recording
#[derive(Debug, Clone)]
pub struct RecordingInfo {
    /// Where the capture was written
    pub audio: AudioRef,
    /// Wall-clock length of the capture
    pub duration: Duration,
}

/// Imperative command surface of the PBX control channel
///
/// Every command is a blocking round-trip from the orchestrator's point of
/// view and must be awaited. `play` resolves when playback finishes or is cut
/// short by `stop_playback` from another task.
#[async_trait]
pub trait CallTransport: Send + Sync {
    /// Dial out; the `Answered` event follows on the event channel
    async fn originate(&self, call: &CallId, destination: &str) -> Result<(), TransportError>;

    /// Start playing a pre-rendered prompt; resolves at end of playback
    async fn play(&self, call: &CallId, audio: &AudioRef) -> Result<(), TransportError>;

    /// Interrupt an in-flight `play`
    async fn stop_playback(&self, call: &CallId) -> Result<(), TransportError>;

    /// Start capturing caller audio into `target`
    async fn start_recording(&self, call: &CallId, target: &AudioRef)
        -> Result<(), TransportError>;

    /// Stop the capture and report what was recorded
    async fn stop_recording(&self, call: &CallId) -> Result<RecordingInfo, TransportError>;

    /// Tear the call down
    async fn hangup(&self, call: &CallId) -> Result<(), TransportError>;
}
