//! Flow navigation and qualification
//!
//! `ScenarioGraph` is a thin navigator over one immutable definition: intent
//! routing with the `"*"` wildcard, rail traversal, and message rendering.
//! `QualificationTracker` accumulates the lead score for one call.

use std::sync::Arc;

use call_agent_core::{IntentLabel, ScenarioDefinition, StepConfig};

use crate::store::ScenarioError;

/// Navigator over one loaded scenario
#[derive(Clone)]
pub struct ScenarioGraph {
    definition: Arc<ScenarioDefinition>,
}

impl ScenarioGraph {
    pub fn new(definition: Arc<ScenarioDefinition>) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &ScenarioDefinition {
        &self.definition
    }

    /// Step configuration by name
    pub fn step(&self, name: &str) -> Result<&StepConfig, ScenarioError> {
        self.definition
            .step(name)
            .ok_or_else(|| ScenarioError::NoRoute {
                step: name.to_string(),
                intent: "-".to_string(),
            })
    }

    /// Next step for an intent: exact mapping, else the wildcard, else a
    /// fatal no-route for that step
    pub fn next_step(&self, current: &str, intent: IntentLabel) -> Result<&str, ScenarioError> {
        let step = self.step(current)?;
        step.route(intent.as_str())
            .ok_or_else(|| ScenarioError::NoRoute {
                step: current.to_string(),
                intent: intent.as_str().to_string(),
            })
    }

    /// Following entry of the rail, `None` past the end or off-rail
    pub fn next_rail_step(&self, current: &str) -> Option<&str> {
        let rail = self.definition.metadata.rail.as_ref()?;
        let pos = rail.iter().position(|s| s == current)?;
        rail.get(pos + 1).map(|s| s.as_str())
    }

    /// First rail entry when the scenario runs in autonomous mode
    pub fn rail_start(&self) -> Option<&str> {
        self.definition
            .metadata
            .rail
            .as_ref()
            .and_then(|r| r.first())
            .map(|s| s.as_str())
    }

    /// Message of a step with scenario variables substituted
    pub fn render_message(&self, step: &StepConfig) -> String {
        self.definition.substitute(&step.message)
    }
}

/// Accumulates the qualification score of one call
///
/// Only steps flagged qualifying contribute: their weight joins the visited
/// total when the step's reply is classified, and the accumulated score when
/// that reply is an affirm. The call is a qualified lead once the accumulated
/// score reaches the configured fraction of the visited total.
#[derive(Debug, Clone)]
pub struct QualificationTracker {
    accumulated: f32,
    visited_weight: f32,
    threshold_fraction: f32,
}

impl QualificationTracker {
    pub fn new(threshold_fraction: f32) -> Self {
        Self {
            accumulated: 0.0,
            visited_weight: 0.0,
            threshold_fraction,
        }
    }

    /// Record the classified reply of a step
    pub fn record(&mut self, step: &StepConfig, intent: IntentLabel) {
        if !step.qualifying {
            return;
        }
        let weight = step.weight();
        self.visited_weight += weight;
        if intent == IntentLabel::Affirm {
            self.accumulated += weight;
        }
    }

    pub fn score(&self) -> f32 {
        self.accumulated
    }

    pub fn visited_weight(&self) -> f32 {
        self.visited_weight
    }

    /// Whether the call qualifies as a lead
    pub fn is_qualified(&self) -> bool {
        self.visited_weight > 0.0
            && self.accumulated >= self.threshold_fraction * self.visited_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::{AudioKind, ScenarioMetadata, END_STEP};
    use std::collections::HashMap;

    fn step(qualifying: bool, weight: f32, routes: &[(&str, &str)]) -> StepConfig {
        StepConfig {
            message: "...".into(),
            audio_type: AudioKind::None,
            audio_ref: None,
            barge_in: None,
            timeout_secs: None,
            max_autonomous_turns: None,
            qualifying,
            qualification_weight: (weight > 0.0).then_some(weight),
            intents: routes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn graph() -> ScenarioGraph {
        let mut steps = HashMap::new();
        steps.insert("q1".to_string(), step(false, 0.0, &[("affirm", "q2"), ("*", END_STEP)]));
        steps.insert("q2".to_string(), step(true, 60.0, &[("*", END_STEP)]));
        ScenarioGraph::new(Arc::new(ScenarioDefinition {
            name: "demo".into(),
            metadata: ScenarioMetadata {
                voice: "fr-1".into(),
                theme: "finance".into(),
                barge_in: true,
                rail: Some(vec!["q1".into(), "q2".into()]),
            },
            variables: HashMap::new(),
            steps,
            entry_step: "q1".into(),
        }))
    }

    #[test]
    fn test_next_step_exact_then_wildcard() {
        let g = graph();
        assert_eq!(g.next_step("q1", IntentLabel::Affirm).unwrap(), "q2");
        assert_eq!(g.next_step("q1", IntentLabel::Deny).unwrap(), END_STEP);
    }

    #[test]
    fn test_no_route_is_an_error() {
        let mut steps = HashMap::new();
        steps.insert("only".to_string(), step(false, 0.0, &[("affirm", END_STEP)]));
        let g = ScenarioGraph::new(Arc::new(ScenarioDefinition {
            name: "demo".into(),
            metadata: ScenarioMetadata {
                voice: String::new(),
                theme: "general".into(),
                barge_in: false,
                rail: None,
            },
            variables: HashMap::new(),
            steps,
            entry_step: "only".into(),
        }));
        assert!(matches!(
            g.next_step("only", IntentLabel::Deny),
            Err(ScenarioError::NoRoute { .. })
        ));
    }

    #[test]
    fn test_rail_traversal() {
        let g = graph();
        assert_eq!(g.rail_start(), Some("q1"));
        assert_eq!(g.next_rail_step("q1"), Some("q2"));
        assert_eq!(g.next_rail_step("q2"), None);
        assert_eq!(g.next_rail_step("q9"), None);
    }

    #[test]
    fn test_qualification_only_on_qualifying_steps() {
        let g = graph();
        let mut tracker = QualificationTracker::new(0.65);

        tracker.record(g.step("q1").unwrap(), IntentLabel::Affirm);
        assert_eq!(tracker.score(), 0.0);
        assert_eq!(tracker.visited_weight(), 0.0);

        tracker.record(g.step("q2").unwrap(), IntentLabel::Affirm);
        assert_eq!(tracker.score(), 60.0);
        assert!(tracker.is_qualified());
    }

    #[test]
    fn test_deny_on_qualifying_step_counts_visited_only() {
        let g = graph();
        let mut tracker = QualificationTracker::new(0.65);
        tracker.record(g.step("q2").unwrap(), IntentLabel::Deny);
        assert_eq!(tracker.score(), 0.0);
        assert_eq!(tracker.visited_weight(), 60.0);
        assert!(!tracker.is_qualified());
    }

    #[test]
    fn test_threshold_fraction() {
        let qualifying = step(true, 50.0, &[("*", END_STEP)]);
        let mut tracker = QualificationTracker::new(0.65);
        // Two qualifying steps, one affirmed: 50 / 100 < 0.65
        tracker.record(&qualifying, IntentLabel::Affirm);
        tracker.record(&qualifying, IntentLabel::Deny);
        assert!(!tracker.is_qualified());

        // A third affirmed: 100 / 150 >= 0.65
        tracker.record(&qualifying, IntentLabel::Affirm);
        assert!(tracker.is_qualified());
    }

    #[test]
    fn test_no_qualifying_steps_never_qualifies() {
        let tracker = QualificationTracker::new(0.65);
        assert!(!tracker.is_qualified());
    }
}
