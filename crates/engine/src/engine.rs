//! Engine supervisor
//!
//! Owns the shared cache, the call registry and the transport event
//! dispatcher. Each placed call runs in its own task; shutdown stops intake,
//! waits for in-flight calls up to the configured grace period, then aborts
//! the stragglers.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use call_agent_cache::{CacheOptions, CacheStore, CacheStoreOptions};
use call_agent_config::Settings;
use call_agent_core::{
    CallId, CallTransport, SentimentAnalyzer, Transcriber, TransportEvent, VoiceActivityProbe,
};
use call_agent_nlu::{IntentClassifier, MatcherRegistry};
use call_agent_scenario::{ScenarioError, ScenarioStore};

use crate::orchestrator::CallOrchestrator;
use crate::phases::PhaseExecutor;
use crate::registry::CallRegistry;
use crate::session::CallReport;

/// Interval at which shutdown re-checks for drained calls
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Failures to accept a new call
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine is at capacity ({limit} calls in flight)")]
    AtCapacity { limit: usize },

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

/// Top-level engine: intake, supervision and shutdown
pub struct CallEngine {
    orchestrator: Arc<CallOrchestrator>,
    scenarios: Arc<ScenarioStore>,
    registry: Arc<CallRegistry>,
    settings: Arc<Settings>,
    accepting: AtomicBool,
    reports_tx: mpsc::UnboundedSender<CallReport>,
    reports_rx: Mutex<Option<mpsc::UnboundedReceiver<CallReport>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl CallEngine {
    /// Wire the engine from its collaborators and settings
    ///
    /// `events` is the transport's event stream; the engine spawns the
    /// dispatcher that routes it to per-call tasks.
    pub fn new(
        transport: Arc<dyn CallTransport>,
        transcriber: Arc<dyn Transcriber>,
        probe: Arc<dyn VoiceActivityProbe>,
        sentiment: Option<Arc<dyn SentimentAnalyzer>>,
        mut events: mpsc::Receiver<TransportEvent>,
        settings: Settings,
    ) -> Self {
        let settings = Arc::new(settings);
        let cache = Arc::new(CacheStore::new(cache_options(&settings)));
        let scenarios = Arc::new(ScenarioStore::new(
            &settings.engine.scenario_dir,
            Arc::clone(&cache),
        ));
        let matchers = Arc::new(MatcherRegistry::new(
            &settings.engine.objection_dir,
            Arc::clone(&cache),
        ));
        let classifier = Arc::new(IntentClassifier::default());
        let phases = PhaseExecutor::new(
            Arc::clone(&transport),
            transcriber,
            probe,
            settings.amd.clone(),
            settings.listen.clone(),
            settings.barge_in.clone(),
        );
        let orchestrator = Arc::new(CallOrchestrator::new(
            transport,
            phases,
            classifier,
            matchers,
            sentiment,
            Arc::clone(&settings),
        ));

        let registry = Arc::new(CallRegistry::new());
        let dispatcher = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    registry.dispatch(event);
                }
                tracing::info!("transport event stream closed");
            })
        };

        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            scenarios,
            registry,
            settings,
            accepting: AtomicBool::new(true),
            reports_tx,
            reports_rx: Mutex::new(Some(reports_rx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Stream of finished-call reports; can be taken once
    pub fn reports(&self) -> Option<mpsc::UnboundedReceiver<CallReport>> {
        self.reports_rx.lock().take()
    }

    /// Calls currently in flight
    pub fn active_calls(&self) -> usize {
        self.registry.len()
    }

    /// Place an outbound call
    ///
    /// The scenario is loaded and validated before anything is dialed; a
    /// validation failure surfaces here and no call starts.
    pub fn place_call(
        &self,
        destination: &str,
        scenario_name: &str,
    ) -> Result<CallId, EngineError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(EngineError::ShuttingDown);
        }
        let limit = self.settings.engine.max_concurrent_calls;
        if self.registry.len() >= limit {
            return Err(EngineError::AtCapacity { limit });
        }

        let scenario = self.scenarios.load(scenario_name)?;

        let call = CallId::new();
        let (handle, events, hangup) = self.registry.register(&call);

        let orchestrator = Arc::clone(&self.orchestrator);
        let registry = Arc::clone(&self.registry);
        let reports = self.reports_tx.clone();
        let task_call = call.clone();
        let destination = destination.to_string();

        let task = tokio::spawn(async move {
            let report = orchestrator
                .run(task_call.clone(), destination, scenario, handle, events, hangup)
                .await;
            registry.remove(&task_call);
            let _ = reports.send(report);
        });
        if let Some(entry) = self.registry.get(&call) {
            entry.set_abort(task.abort_handle());
        }

        metrics::gauge!("calls_in_flight").set(self.registry.len() as f64);
        tracing::info!(%call, scenario = scenario_name, "call placed");
        Ok(call)
    }

    /// Stop intake, drain in-flight calls, then force-terminate what is left
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        tracing::info!(
            in_flight = self.registry.len(),
            grace_secs = self.settings.engine.shutdown_grace_secs,
            "engine shutting down"
        );

        let drained = tokio::time::timeout(self.settings.engine.shutdown_grace(), async {
            while !self.registry.is_empty() {
                tokio::time::sleep(DRAIN_POLL).await;
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = self.registry.len(),
                "grace period elapsed, aborting remaining calls"
            );
            self.registry.abort_all();
        }

        if let Some(dispatcher) = self.dispatcher.lock().take() {
            dispatcher.abort();
        }
    }
}

fn cache_options(settings: &Settings) -> CacheStoreOptions {
    let cache = &settings.cache;
    CacheStoreOptions {
        scenarios: CacheOptions::new(
            Duration::from_secs(cache.scenario_ttl_secs),
            cache.scenario_capacity,
        ),
        objections: CacheOptions::new(
            Duration::from_secs(cache.objection_ttl_secs),
            cache.objection_capacity,
        ),
        models: CacheOptions::unbounded(cache.model_capacity),
    }
}
