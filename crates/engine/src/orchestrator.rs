//! Per-call conversation state machine
//!
//! Lifecycle: originate, wait for answer, AMD, then the step loop — play the
//! step, wait for the reply, classify it, maybe enter the autonomous
//! objection sub-loop, accumulate qualification and route to the next step —
//! until a terminal route, a failure bound or a hangup ends the call.
//!
//! Hangup bookkeeping: before the orchestrator ends a call itself it
//! pre-declares the outcome on the call handle; a hangup event arriving
//! without that declaration is the caller's, and an answered in-progress
//! call then defaults to NOT_INTERESTED.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use call_agent_config::Settings;
use call_agent_core::{
    AudioRef, CallId, CallOutcome, CallPhase, CallTransport, HangupOrigin, IntentLabel,
    ScenarioDefinition, SentimentAnalyzer, TransportError, TransportEvent, TurnRecord, END_STEP,
};
use call_agent_nlu::{IntentClassifier, MatcherRegistry, ObjectionMatcher};
use call_agent_scenario::{ScenarioError, ScenarioGraph};

use crate::phases::{AmdVerdict, PhaseExecutor};
use crate::registry::CallHandle;
use crate::session::{CallReport, CallSession};

/// Grace period for the hangup-completion event after our own hangup command
const HANGUP_GRACE: Duration = Duration::from_secs(5);

/// Why the state machine stopped before deciding an outcome itself
enum CallEnd {
    /// The caller (or carrier) dropped the call
    CallerHungUp,
    /// A transport command failed; fatal for this call only
    Transport(TransportError),
}

impl From<TransportError> for CallEnd {
    fn from(e: TransportError) -> Self {
        CallEnd::Transport(e)
    }
}

/// Resolution of the autonomous objection sub-loop
enum ObjectionOutcome {
    /// The caller came around; continue on the affirm path
    Resolved,
    /// Turns exhausted, lookup missed or the caller disengaged
    Unresolved,
}

/// Drives one call from origination to its final report
pub struct CallOrchestrator {
    transport: Arc<dyn CallTransport>,
    phases: PhaseExecutor,
    classifier: Arc<IntentClassifier>,
    matchers: Arc<MatcherRegistry>,
    sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    settings: Arc<Settings>,
}

impl CallOrchestrator {
    pub fn new(
        transport: Arc<dyn CallTransport>,
        phases: PhaseExecutor,
        classifier: Arc<IntentClassifier>,
        matchers: Arc<MatcherRegistry>,
        sentiment: Option<Arc<dyn SentimentAnalyzer>>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            transport,
            phases,
            classifier,
            matchers,
            sentiment,
            settings,
        }
    }

    /// Run one call to completion
    pub async fn run(
        &self,
        call: CallId,
        destination: String,
        scenario: Arc<ScenarioDefinition>,
        handle: Arc<CallHandle>,
        mut events: mpsc::Receiver<TransportEvent>,
        mut hangup: watch::Receiver<bool>,
    ) -> CallReport {
        let graph = ScenarioGraph::new(Arc::clone(&scenario));
        let entry = graph
            .rail_start()
            .unwrap_or(&scenario.entry_step)
            .to_string();
        let mut session = CallSession::new(
            call.clone(),
            Arc::clone(&scenario),
            entry,
            self.settings.qualification.threshold_fraction,
        );

        let end = self
            .drive(&mut session, &destination, &graph, &mut events, &mut hangup)
            .await;

        let report = match end {
            Ok(outcome) => {
                self.finalize_robot(session, outcome, &handle, &mut hangup)
                    .await
            }
            Err(CallEnd::CallerHungUp) => {
                let outcome = match session.phase {
                    CallPhase::Init => CallOutcome::NoAnswer,
                    _ if session.qualification.is_qualified() => CallOutcome::Lead,
                    _ => CallOutcome::NotInterested,
                };
                tracing::info!(call = %session.id, outcome = outcome.as_str(), "caller hung up");
                session.into_report(outcome, HangupOrigin::Caller)
            }
            Err(CallEnd::Transport(e)) => {
                tracing::error!(call = %session.id, error = %e, "transport failure ended call");
                self.finalize_robot(session, CallOutcome::Completed, &handle, &mut hangup)
                    .await
            }
        };

        metrics::counter!("call_outcomes_total", "outcome" => report.outcome.as_str())
            .increment(1);
        report
    }

    /// The state machine proper; `Ok` carries a robot-decided outcome
    async fn drive(
        &self,
        session: &mut CallSession,
        destination: &str,
        graph: &ScenarioGraph,
        events: &mut mpsc::Receiver<TransportEvent>,
        hangup: &mut watch::Receiver<bool>,
    ) -> Result<CallOutcome, CallEnd> {
        let call = session.id.clone();

        // Dial out and wait for a pickup
        if let Err(e) = self.transport.originate(&call, destination).await {
            tracing::warn!(%call, error = %e, "origination failed");
            return Ok(CallOutcome::NoAnswer);
        }
        let answered = tokio::time::timeout(
            self.settings.dial.ring_timeout(),
            wait_for_answer(events, hangup),
        )
        .await;
        match answered {
            Ok(Some(())) => {}
            Ok(None) => return Err(CallEnd::CallerHungUp),
            Err(_) => {
                tracing::info!(%call, "ring timeout");
                return Ok(CallOutcome::NoAnswer);
            }
        }

        // Answering-machine detection
        session.phase = CallPhase::Amd;
        let amd = match race_hangup(hangup, self.phases.amd(&call)).await {
            Some(result) => result?,
            None => return Err(CallEnd::CallerHungUp),
        };
        if amd.verdict == AmdVerdict::Machine {
            return Ok(CallOutcome::NoAnswer);
        }

        // Theme matcher is built lazily once and reused across the call
        let mut matcher: Option<ObjectionMatcher> = None;

        // Step loop
        loop {
            drain_dtmf(events, session);

            let step_name = session.current_step.clone();
            let step = match graph.step(&step_name) {
                Ok(step) => step,
                Err(e) => {
                    tracing::error!(%call, step = %step_name, error = %e, "lost the flow");
                    return Ok(CallOutcome::Completed);
                }
            };

            // Play the prompt
            session.phase = CallPhase::Playing;
            let message = graph.render_message(step);
            session.push_turn(TurnRecord::agent(message));
            if let Some(audio) = step.audio_ref.as_deref() {
                let barge_in = step.barge_in_or(scenario_barge_in(graph));
                let audio = AudioRef::new(audio);
                let played =
                    match race_hangup(hangup, self.phases.play(&call, &audio, barge_in)).await {
                        Some(result) => result?,
                        None => return Err(CallEnd::CallerHungUp),
                    };
                if played.interrupted {
                    tracing::debug!(
                        %call,
                        step = %step_name,
                        at_ms = played.elapsed.as_millis() as u64,
                        "caller barged in"
                    );
                }
            }

            // Listen for the reply
            session.phase = CallPhase::Waiting;
            let step_timeout = step.timeout_secs.map(Duration::from_secs);
            let reply = match race_hangup(hangup, self.phases.wait_reply(&call, step_timeout)).await {
                Some(result) => result?,
                None => return Err(CallEnd::CallerHungUp),
            };

            if reply.is_silence() {
                if session.note_silence(&self.settings.limits) {
                    tracing::info!(%call, step = %step_name, "silence bound reached");
                    return Ok(CallOutcome::NotInterested);
                }
                // Explicit silence route if the step has one, else repeat
                if let Some(target) = step.intents.get(IntentLabel::Silence.as_str()) {
                    if target.as_str() == END_STEP {
                        return Ok(CallOutcome::NotInterested);
                    }
                    session.current_step = target.clone();
                }
                continue;
            }

            // Classify the reply
            let text = reply.transcript.text.clone();
            let result = self.classifier.classify(&text);
            tracing::debug!(
                %call,
                step = %step_name,
                intent = %result.label,
                confidence = result.confidence,
                stage = ?result.stage,
                "classified reply"
            );

            let mut turn = TurnRecord::caller(&text, result.label);
            turn.sentiment = self.analyze_sentiment(&text).await;
            session.push_turn(turn);

            if result.label == IntentLabel::Unsure {
                if session.note_no_match(&self.settings.limits) {
                    tracing::info!(%call, step = %step_name, "no-match bound reached");
                    return Ok(CallOutcome::NotInterested);
                }
            } else {
                session.note_understood(result.label);
            }

            // Autonomous objection handling within the step
            let mut effective = result.label;
            let max_turns = step.max_autonomous_turns.unwrap_or(0);
            if result.label.wants_rebuttal() && max_turns > 0 {
                session.phase = CallPhase::ObjectionLoop;
                if matcher.is_none() {
                    matcher = self.build_matcher(graph);
                }
                effective = match &matcher {
                    Some(m) => {
                        let resolution = self
                            .objection_loop(session, &step_name, max_turns, m, &text, hangup)
                            .await?;
                        match resolution {
                            ObjectionOutcome::Resolved => IntentLabel::Affirm,
                            ObjectionOutcome::Unresolved => IntentLabel::Deny,
                        }
                    }
                    None => IntentLabel::Deny,
                };
            }

            // Qualification accumulates on the step's classified answer
            session.qualification.record(step, effective);

            // Route to the next step
            let next = self.route(graph, &step_name, effective);
            match next {
                Some(target) if target == END_STEP => {
                    return Ok(self.closing_outcome(session));
                }
                Some(target) => {
                    session.current_step = target;
                }
                None => {
                    // Rail exhausted or no route at all
                    return Ok(self.closing_outcome(session));
                }
            }
        }
    }

    /// Routing: an exact intent entry wins; a rail advances otherwise; the
    /// wildcard is the last resort off-rail
    fn route(&self, graph: &ScenarioGraph, step_name: &str, intent: IntentLabel) -> Option<String> {
        let step = graph.step(step_name).ok()?;

        if let Some(target) = step.intents.get(intent.as_str()) {
            return Some(target.clone());
        }
        if graph.definition().metadata.rail.is_some() {
            return graph.next_rail_step(step_name).map(|s| s.to_string());
        }
        match graph.next_step(step_name, intent) {
            Ok(target) => Some(target.to_string()),
            Err(ScenarioError::NoRoute { .. }) => {
                tracing::error!(step = %step_name, intent = %intent, "no route for intent");
                None
            }
            Err(_) => None,
        }
    }

    /// Outcome when the flow reaches its end on our side
    fn closing_outcome(&self, session: &CallSession) -> CallOutcome {
        if session.qualification.is_qualified() {
            CallOutcome::Lead
        } else if session.last_intent == Some(IntentLabel::Deny) {
            CallOutcome::NotInterested
        } else {
            CallOutcome::Completed
        }
    }

    /// The autonomous rebuttal sub-loop, bounded by the step's turn budget
    async fn objection_loop(
        &self,
        session: &mut CallSession,
        step_name: &str,
        max_turns: u32,
        matcher: &ObjectionMatcher,
        initial_text: &str,
        hangup: &mut watch::Receiver<bool>,
    ) -> Result<ObjectionOutcome, CallEnd> {
        let call = session.id.clone();
        let mut utterance = initial_text.to_string();

        while session.turns_spent(step_name) < max_turns {
            let Some(rebuttal) = matcher.find_best_match(
                &utterance,
                self.settings.matcher.min_score,
                self.settings.matcher.top_n,
            ) else {
                tracing::debug!(%call, step = %step_name, "no rebuttal found");
                return Ok(ObjectionOutcome::Unresolved);
            };

            tracing::debug!(
                %call,
                step = %step_name,
                key = %rebuttal.key,
                score = rebuttal.score,
                method = rebuttal.method.as_str(),
                "playing rebuttal"
            );
            session.push_turn(TurnRecord::agent(&rebuttal.response));
            session.spend_turn(step_name);

            if let Some(audio) = &rebuttal.audio_ref {
                match race_hangup(hangup, self.phases.play(&call, audio, true)).await {
                    Some(result) => {
                        result?;
                    }
                    None => return Err(CallEnd::CallerHungUp),
                }
            }

            let reply = match race_hangup(hangup, self.phases.wait_reply(&call, None)).await {
                Some(result) => result?,
                None => return Err(CallEnd::CallerHungUp),
            };
            if reply.is_silence() {
                // A caller gone quiet mid-rebuttal has disengaged
                return Ok(ObjectionOutcome::Unresolved);
            }

            let result = self.classifier.classify(&reply.transcript.text);
            let mut turn = TurnRecord::caller(&reply.transcript.text, result.label);
            turn.sentiment = self.analyze_sentiment(&reply.transcript.text).await;
            session.push_turn(turn);

            match result.label {
                IntentLabel::Affirm => return Ok(ObjectionOutcome::Resolved),
                IntentLabel::Objection | IntentLabel::Question | IntentLabel::Unsure => {
                    utterance = reply.transcript.text.clone();
                }
                // A deny spends the turn; the next rebuttal re-addresses the
                // original concern
                IntentLabel::Deny | IntentLabel::Silence => {}
            }
        }

        tracing::debug!(%call, step = %step_name, "objection turns exhausted");
        Ok(ObjectionOutcome::Unresolved)
    }

    fn build_matcher(&self, graph: &ScenarioGraph) -> Option<ObjectionMatcher> {
        let theme = &graph.definition().metadata.theme;
        match self.matchers.matcher_for(theme) {
            Ok(matcher) => Some(matcher),
            Err(e) => {
                // A missing dataset degrades to the generic deny path
                tracing::warn!(theme = %theme, error = %e, "objection dataset unavailable");
                None
            }
        }
    }

    async fn analyze_sentiment(
        &self,
        text: &str,
    ) -> Option<call_agent_core::traits::SentimentResult> {
        let analyzer = self.sentiment.as_ref()?;
        match analyzer.analyze(text).await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::debug!(error = %e, "sentiment analysis failed, ignoring");
                None
            }
        }
    }

    /// Robot-initiated hangup: pre-declare the outcome, send the command,
    /// and give the completion event a bounded grace period
    async fn finalize_robot(
        &self,
        mut session: CallSession,
        outcome: CallOutcome,
        handle: &CallHandle,
        hangup: &mut watch::Receiver<bool>,
    ) -> CallReport {
        session.phase = CallPhase::Finalizing;
        handle.declare_robot_hangup(outcome);

        if let Err(e) = self.transport.hangup(&session.id).await {
            tracing::warn!(call = %session.id, error = %e, "hangup command failed");
        } else if !*hangup.borrow() {
            let confirmed = tokio::time::timeout(HANGUP_GRACE, hangup.changed()).await;
            if confirmed.is_err() {
                tracing::warn!(call = %session.id, "no hangup completion within grace period");
            }
        }

        tracing::info!(
            call = %session.id,
            outcome = outcome.as_str(),
            score = session.qualification.score(),
            "call finalized"
        );
        session.into_report(outcome, HangupOrigin::Robot)
    }
}

/// Scenario-level default barge-in flag
fn scenario_barge_in(graph: &ScenarioGraph) -> bool {
    graph.definition().metadata.barge_in
}

/// Move queued DTMF digits onto the session journal
fn drain_dtmf(events: &mut mpsc::Receiver<TransportEvent>, session: &mut CallSession) {
    while let Ok(event) = events.try_recv() {
        if let TransportEvent::Dtmf { digit, .. } = event {
            tracing::debug!(call = %session.id, digit = %digit, "DTMF received");
            session.dtmf.push(digit);
        }
    }
}

/// Consume events until the call is answered; `None` means it was hung up
async fn wait_for_answer(
    events: &mut mpsc::Receiver<TransportEvent>,
    hangup: &mut watch::Receiver<bool>,
) -> Option<()> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(TransportEvent::Answered { .. }) => return Some(()),
                Some(_) => continue,
                None => return None,
            },
            _ = hangup.changed() => {
                if *hangup.borrow() {
                    return None;
                }
            }
        }
    }
}

/// Race a phase future against the caller hanging up; `None` means hung up
async fn race_hangup<T>(
    hangup: &mut watch::Receiver<bool>,
    fut: impl Future<Output = T>,
) -> Option<T> {
    if *hangup.borrow() {
        return None;
    }
    tokio::select! {
        value = fut => Some(value),
        // The watch only ever flips to true
        _ = hangup.changed() => None,
    }
}
