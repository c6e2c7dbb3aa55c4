//! Call registry and hangup bookkeeping
//!
//! The registry is the only shared mutable surface keyed by call id. It
//! exists for three things: routing transport events to the owning task,
//! cancelling a call from the outside, and the robot-hangup handshake that
//! distinguishes our own hangups from the caller's. Session internals are
//! never reached through it.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;

use call_agent_core::{CallId, CallOutcome, TransportEvent};

/// Per-call entry in the registry
pub struct CallHandle {
    /// Queue of call-progress events (answer, DTMF) for the owning task
    events: mpsc::Sender<TransportEvent>,
    /// Flips to true when the transport reports the call down
    hangup: watch::Sender<bool>,
    /// Outcome pre-declared by the orchestrator before it hangs up itself
    robot_outcome: Mutex<Option<CallOutcome>>,
    /// Abort handle of the owning task, for shutdown and cancellation
    abort: Mutex<Option<AbortHandle>>,
}

impl CallHandle {
    /// Pre-register a robot-initiated hangup with its intended outcome
    pub fn declare_robot_hangup(&self, outcome: CallOutcome) {
        *self.robot_outcome.lock() = Some(outcome);
    }

    /// The pre-declared outcome, if the robot initiated the hangup
    pub fn robot_outcome(&self) -> Option<CallOutcome> {
        *self.robot_outcome.lock()
    }

    pub fn set_abort(&self, handle: AbortHandle) {
        *self.abort.lock() = Some(handle);
    }
}

/// Registry of in-flight calls
#[derive(Default)]
pub struct CallRegistry {
    calls: DashMap<String, Arc<CallHandle>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call; returns its handle plus the receiving ends the
    /// owning task consumes
    pub fn register(
        &self,
        call: &CallId,
    ) -> (
        Arc<CallHandle>,
        mpsc::Receiver<TransportEvent>,
        watch::Receiver<bool>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (hangup_tx, hangup_rx) = watch::channel(false);
        let handle = Arc::new(CallHandle {
            events: event_tx,
            hangup: hangup_tx,
            robot_outcome: Mutex::new(None),
            abort: Mutex::new(None),
        });
        self.calls.insert(call.to_string(), Arc::clone(&handle));
        (handle, event_rx, hangup_rx)
    }

    /// Release a finished call within its grace period
    pub fn remove(&self, call: &CallId) {
        self.calls.remove(call.as_str());
    }

    pub fn get(&self, call: &CallId) -> Option<Arc<CallHandle>> {
        self.calls.get(call.as_str()).map(|e| Arc::clone(&e))
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Route one transport event to its call
    ///
    /// Hangups flip the per-call watch channel so a mid-phase task observes
    /// them immediately; everything else queues on the event channel.
    pub fn dispatch(&self, event: TransportEvent) {
        let Some(handle) = self.get(event.call()) else {
            tracing::debug!(call = %event.call(), "event for unknown call dropped");
            return;
        };

        match event {
            TransportEvent::HangupCompleted { call } => {
                tracing::debug!(%call, robot = handle.robot_outcome().is_some(), "hangup completed");
                let _ = handle.hangup.send(true);
            }
            other => {
                if handle.events.try_send(other).is_err() {
                    tracing::warn!("per-call event queue full, event dropped");
                }
            }
        }
    }

    /// Abort every registered call task (shutdown force-termination)
    pub fn abort_all(&self) {
        for entry in self.calls.iter() {
            if let Some(abort) = entry.value().abort.lock().take() {
                abort.abort();
            }
        }
    }
}
