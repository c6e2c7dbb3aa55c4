//! Scenario document model
//!
//! A scenario is the persisted definition of one conversation flow: metadata,
//! a variables map and a map of named steps. Loaded once, validated, then
//! shared read-only across calls through the cache.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Intent-map key that matches any intent without a specific route
pub const WILDCARD_INTENT: &str = "*";

/// Route target that ends the conversation
///
/// A step routing to this name is terminal: the orchestrator finalizes the
/// call instead of playing another step.
pub const END_STEP: &str = "end";

/// Whether a step carries pre-rendered audio or is message-text only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioKind {
    /// `audio_ref` points at a pre-rendered prompt
    #[default]
    Audio,
    /// No audio artifact; the message text is informational only
    None,
}

/// Scenario-level metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioMetadata {
    /// Voice the prompts were rendered with
    #[serde(default)]
    pub voice: String,
    /// Objection/FAQ theme consulted during the objection loop
    pub theme: String,
    /// Default barge-in behavior for steps that do not override it
    #[serde(default)]
    pub barge_in: bool,
    /// Ordered step names for the fully autonomous mode
    #[serde(default)]
    pub rail: Option<Vec<String>>,
}

/// One conversation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Message text; supports `{variable}` substitution from the scenario
    /// variables map
    pub message: String,
    /// Audio artifact kind for this step
    #[serde(default)]
    pub audio_type: AudioKind,
    /// Prompt audio, required when `audio_type` is `Audio`
    #[serde(default)]
    pub audio_ref: Option<String>,
    /// Barge-in override for this step
    #[serde(default)]
    pub barge_in: Option<bool>,
    /// Reply timeout in seconds for the waiting phase
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Autonomous objection turns allowed on this step (0 disables the loop)
    #[serde(default)]
    pub max_autonomous_turns: Option<u32>,
    /// Whether an affirmative answer here counts toward qualification
    #[serde(default)]
    pub qualifying: bool,
    /// Weight added to the qualification score, 0-100
    #[serde(default)]
    pub qualification_weight: Option<f32>,
    /// Intent name -> next step name; `"*"` is the wildcard fallback
    pub intents: HashMap<String, String>,
}

impl StepConfig {
    /// Route for a specific intent, falling back to the wildcard
    pub fn route(&self, intent: &str) -> Option<&str> {
        self.intents
            .get(intent)
            .or_else(|| self.intents.get(WILDCARD_INTENT))
            .map(|s| s.as_str())
    }

    /// Effective barge-in flag given the scenario default
    pub fn barge_in_or(&self, default: bool) -> bool {
        self.barge_in.unwrap_or(default)
    }

    /// Effective weight, 0 when absent
    pub fn weight(&self) -> f32 {
        self.qualification_weight.unwrap_or(0.0)
    }
}

/// A full conversation definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    pub metadata: ScenarioMetadata,
    /// Substitution variables available to step messages
    #[serde(default)]
    pub variables: HashMap<String, String>,
    /// Step name -> configuration
    pub steps: HashMap<String, StepConfig>,
    /// Name of the entry step
    pub entry_step: String,
}

impl ScenarioDefinition {
    pub fn step(&self, name: &str) -> Option<&StepConfig> {
        self.steps.get(name)
    }

    /// Substitute `{name}` placeholders in a message from the variables map
    ///
    /// Unknown placeholders are left untouched so a missing variable is
    /// visible in logs rather than silently erased.
    pub fn substitute(&self, message: &str) -> String {
        let mut out = message.to_string();
        for (name, value) in &self.variables {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_with_routes(routes: &[(&str, &str)]) -> StepConfig {
        StepConfig {
            message: "Bonjour".into(),
            audio_type: AudioKind::None,
            audio_ref: None,
            barge_in: None,
            timeout_secs: None,
            max_autonomous_turns: None,
            qualifying: false,
            qualification_weight: None,
            intents: routes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_route_prefers_exact_intent() {
        let step = step_with_routes(&[("affirm", "next"), ("*", "fallback")]);
        assert_eq!(step.route("affirm"), Some("next"));
        assert_eq!(step.route("deny"), Some("fallback"));
    }

    #[test]
    fn test_route_without_wildcard() {
        let step = step_with_routes(&[("affirm", "next")]);
        assert_eq!(step.route("deny"), None);
    }

    #[test]
    fn test_variable_substitution() {
        let mut vars = HashMap::new();
        vars.insert("agent_name".to_string(), "Julie".to_string());
        let scenario = ScenarioDefinition {
            name: "demo".into(),
            metadata: ScenarioMetadata {
                voice: "fr-1".into(),
                theme: "finance".into(),
                barge_in: true,
                rail: None,
            },
            variables: vars,
            steps: HashMap::new(),
            entry_step: "intro".into(),
        };

        assert_eq!(
            scenario.substitute("Je suis {agent_name}, de {company}"),
            "Je suis Julie, de {company}"
        );
    }
}
