//! Intent classification and objection matching
//!
//! Two engines share this crate:
//! - `IntentClassifier`: a staged, short-circuiting rule pipeline mapping one
//!   utterance to a fixed intent set. Pure and stateless; all keyword tables
//!   are configuration.
//! - `ObjectionMatcher`: resolves a free-text utterance to the best
//!   objection/FAQ entry of a theme via an exact keyword index plus a fuzzy
//!   scan with tie-breaking and false-positive guards.
//!
//! `MatcherRegistry` loads per-theme datasets from disk and keeps the merged
//! sets in the shared cache so concurrent calls never reload them.

pub mod intent;
pub mod matcher;
pub mod registry;
pub mod similarity;

pub use intent::{IntentClassifier, IntentConfig};
pub use matcher::{ConfidenceBucket, MatchMethod, MatchResult, ObjectionMatcher};
pub use registry::{MatcherRegistry, ObjectionLoadError};
