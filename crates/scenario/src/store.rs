//! Scenario persistence and validation
//!
//! Scenarios are JSON documents, one file per scenario under the data
//! directory. Validation happens once at load time and is fatal for the call
//! that requested the scenario; a validated definition is cached and shared
//! read-only.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use call_agent_cache::CacheStore;
use call_agent_core::{AudioKind, ScenarioDefinition, END_STEP};

/// Maximum autonomous objection turns a step may configure
const MAX_AUTONOMOUS_TURNS: u32 = 10;

/// Scenario loading and validation failures
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("no scenario named '{0}'")]
    UnknownScenario(String),

    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("scenario '{scenario}' invalid at step '{step}': {message}")]
    Validation {
        scenario: String,
        step: String,
        message: String,
    },

    #[error("step '{step}' has no route for intent '{intent}'")]
    NoRoute { step: String, intent: String },
}

impl ScenarioError {
    fn invalid(scenario: &str, step: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            scenario: scenario.to_string(),
            step: step.to_string(),
            message: message.into(),
        }
    }
}

/// Resolves scenario names to validated definitions through the cache
pub struct ScenarioStore {
    data_dir: PathBuf,
    cache: Arc<CacheStore>,
}

impl ScenarioStore {
    pub fn new(data_dir: impl Into<PathBuf>, cache: Arc<CacheStore>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache,
        }
    }

    /// Cache-or-load a scenario by name
    pub fn load(&self, name: &str) -> Result<Arc<ScenarioDefinition>, ScenarioError> {
        if let Some(def) = self.cache.scenarios().get(name) {
            return Ok(def);
        }

        let path = self.data_dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(ScenarioError::UnknownScenario(name.to_string()));
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ScenarioError::Io {
            path: display(&path),
            source,
        })?;
        let definition: ScenarioDefinition =
            serde_json::from_str(&content).map_err(|source| ScenarioError::Parse {
                path: display(&path),
                source,
            })?;

        validate(&definition)?;

        let definition = Arc::new(definition);
        self.cache
            .scenarios()
            .insert(name, Arc::clone(&definition));
        tracing::info!(
            scenario = name,
            steps = definition.steps.len(),
            rail = definition.metadata.rail.is_some(),
            "loaded scenario"
        );
        Ok(definition)
    }
}

/// Validate a parsed definition
///
/// Checks per step: non-empty message, audio reference present when the step
/// carries audio, a non-empty intent map, route targets that exist (or the
/// terminal `end`), and bounded autonomous-turn / qualification-weight
/// values. Rail entries must all name existing steps.
pub fn validate(definition: &ScenarioDefinition) -> Result<(), ScenarioError> {
    let name = &definition.name;

    if definition.steps.is_empty() {
        return Err(ScenarioError::invalid(name, "-", "scenario has no steps"));
    }
    if !definition.steps.contains_key(&definition.entry_step) {
        return Err(ScenarioError::invalid(
            name,
            &definition.entry_step,
            "entry step does not exist",
        ));
    }

    for (step_name, step) in &definition.steps {
        if step.message.trim().is_empty() {
            return Err(ScenarioError::invalid(name, step_name, "empty message"));
        }
        if step.audio_type == AudioKind::Audio
            && step.audio_ref.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            return Err(ScenarioError::invalid(
                name,
                step_name,
                "audio step without audio_ref",
            ));
        }
        if step.intents.is_empty() {
            return Err(ScenarioError::invalid(name, step_name, "no intent mapping"));
        }
        for (intent, target) in &step.intents {
            if target != END_STEP && !definition.steps.contains_key(target) {
                return Err(ScenarioError::invalid(
                    name,
                    step_name,
                    format!("intent '{intent}' routes to unknown step '{target}'"),
                ));
            }
        }
        if let Some(turns) = step.max_autonomous_turns {
            if turns > MAX_AUTONOMOUS_TURNS {
                return Err(ScenarioError::invalid(
                    name,
                    step_name,
                    format!("max_autonomous_turns {turns} outside [0, {MAX_AUTONOMOUS_TURNS}]"),
                ));
            }
        }
        if let Some(weight) = step.qualification_weight {
            if !(0.0..=100.0).contains(&weight) {
                return Err(ScenarioError::invalid(
                    name,
                    step_name,
                    format!("qualification_weight {weight} outside [0, 100]"),
                ));
            }
        }
    }

    if let Some(rail) = &definition.metadata.rail {
        for entry in rail {
            if !definition.steps.contains_key(entry) {
                return Err(ScenarioError::invalid(
                    name,
                    entry,
                    "rail references unknown step",
                ));
            }
        }
    }

    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
