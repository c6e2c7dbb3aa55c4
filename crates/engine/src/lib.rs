//! Call-control engine
//!
//! One supervising task per active call runs the `CallOrchestrator` state
//! machine: answering-machine detection, then the step loop of play, wait,
//! classify and route, with the autonomous objection sub-loop inside a step.
//! The `CallEngine` supervisor owns intake, the shared cache, the call
//! registry and graceful shutdown.
//!
//! Concurrency model: session state is exclusively owned by its call task;
//! the only cross-task surfaces are the transport event dispatcher, the
//! registry (lookup, cancellation, hangup bookkeeping) and the shared cache.

pub mod barge_in;
pub mod engine;
pub mod orchestrator;
pub mod phases;
pub mod registry;
pub mod session;

pub use barge_in::{BargeInMonitor, BargeInResult};
pub use engine::{CallEngine, EngineError};
pub use orchestrator::CallOrchestrator;
pub use phases::{AmdOutcome, AmdVerdict, ListenOutcome, PhaseExecutor, PlayOutcome};
pub use registry::{CallHandle, CallRegistry};
pub use session::{CallReport, CallSession};
