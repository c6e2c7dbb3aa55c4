//! Intent labels and classification results

use serde::{Deserialize, Serialize};

/// The fixed set of caller intents
///
/// Scenario intent maps are keyed by the snake_case names of these labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    /// Agreement, acceptance
    Affirm,
    /// Refusal, rejection
    Deny,
    /// Nothing conclusive matched
    Unsure,
    /// The caller asked something
    Question,
    /// A concern the objection matcher should rebut
    Objection,
    /// Empty or blank reply
    Silence,
}

impl IntentLabel {
    /// Key used in scenario intent maps
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Affirm => "affirm",
            IntentLabel::Deny => "deny",
            IntentLabel::Unsure => "unsure",
            IntentLabel::Question => "question",
            IntentLabel::Objection => "objection",
            IntentLabel::Silence => "silence",
        }
    }

    /// Intents that route into the autonomous objection loop
    pub fn wants_rebuttal(&self) -> bool {
        matches!(self, IntentLabel::Objection | IntentLabel::Question)
    }
}

impl std::fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which classifier stage produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyStage {
    /// Empty or blank input
    EmptyInput,
    /// Explicit multi-word negation phrase
    NegationPhrase,
    /// Longest fixed expression across all intents
    FixedExpression,
    /// Interrogative word among the first tokens
    Interrogative,
    /// Standalone negation word anywhere in the input
    NegationWord,
    /// Bag-of-keywords scoring with intent priority
    Keyword,
    /// No stage matched anything
    NoMatch,
}

/// Outcome of classifying one utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub label: IntentLabel,
    /// Confidence in [0, 1], fixed per stage or keyword-count-derived
    pub confidence: f32,
    /// Keywords or expressions that fired
    pub matched: Vec<String>,
    /// Stage that short-circuited the pipeline
    pub stage: ClassifyStage,
}

impl IntentResult {
    pub fn new(label: IntentLabel, confidence: f32, stage: ClassifyStage) -> Self {
        Self {
            label,
            confidence,
            matched: Vec::new(),
            stage,
        }
    }

    pub fn with_matched(mut self, matched: Vec<String>) -> Self {
        self.matched = matched;
        self
    }
}
