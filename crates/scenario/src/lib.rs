//! Scenario loading, validation and navigation
//!
//! A `ScenarioStore` resolves scenario names to validated, immutable
//! `ScenarioDefinition`s through the shared cache. `ScenarioGraph` navigates
//! one definition: intent routing with wildcard fallback, rail traversal for
//! the fully autonomous mode, and qualification accumulation.

pub mod graph;
pub mod store;

pub use graph::{QualificationTracker, ScenarioGraph};
pub use store::{ScenarioError, ScenarioStore};
