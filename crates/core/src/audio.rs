//! Audio references
//!
//! The engine never touches raw audio itself; it passes references to
//! pre-rendered files (prompts, rebuttals) and to capture targets the
//! transport records into.

use serde::{Deserialize, Serialize};

/// Reference to an audio artifact on the media host
///
/// The transport interprets the path; the engine only carries it around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioRef(String);

impl AudioRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AudioRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AudioRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AudioRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}
