//! Objection and FAQ dataset model
//!
//! Datasets are organized per theme; the `general` theme is merged into every
//! requested theme before a matcher is built over the result.

use serde::{Deserialize, Serialize};

use crate::audio::AudioRef;

/// Theme whose entries are merged into every other theme
pub const GENERAL_THEME: &str = "general";

/// Kind of a dataset entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectionKind {
    /// A concern to rebut ("c'est trop cher", "je n'ai pas le temps")
    Objection,
    /// A factual question with a canned answer
    Faq,
}

/// One objection or FAQ entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectionEntry {
    /// Trigger keywords or phrases, matched exactly or fuzzily
    pub keywords: Vec<String>,
    /// Rebuttal or answer text
    pub response: String,
    /// Pre-rendered audio for the response, when available
    #[serde(default)]
    pub audio_ref: Option<AudioRef>,
    pub kind: ObjectionKind,
    /// Theme this entry came from (set when a dataset is loaded)
    #[serde(default)]
    pub theme: String,
}

/// A merged, ready-to-index set of entries for one requested theme
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectionSet {
    /// The theme that was requested (not `general`)
    pub theme: String,
    /// General entries first, then theme-specific ones; the exact-match index
    /// built over this keeps the first registration per keyword
    pub entries: Vec<ObjectionEntry>,
}

impl ObjectionSet {
    pub fn new(theme: impl Into<String>, entries: Vec<ObjectionEntry>) -> Self {
        Self {
            theme: theme.into(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
