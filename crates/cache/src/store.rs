//! The process-wide cache store
//!
//! Three namespaces, one lock each: scenario definitions, merged objection
//! sets, and opaque model/service handles. Built once at startup and injected
//! (`Arc<CacheStore>`) wherever shared read-only data is loaded.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use call_agent_core::{ObjectionSet, ScenarioDefinition};

use crate::ttl::{CacheOptions, TtlCache};

/// Opaque handle to a loaded model or external-service client
///
/// Downcast by the component that registered it; the cache only keeps it
/// alive and shares it.
pub type ModelHandle = Arc<dyn Any + Send + Sync>;

/// TTLs and capacities for the three namespaces
#[derive(Debug, Clone, Copy)]
pub struct CacheStoreOptions {
    pub scenarios: CacheOptions,
    pub objections: CacheOptions,
    pub models: CacheOptions,
}

impl Default for CacheStoreOptions {
    fn default() -> Self {
        Self {
            scenarios: CacheOptions::new(Duration::from_secs(3600), 50),
            objections: CacheOptions::new(Duration::from_secs(1800), 20),
            models: CacheOptions::unbounded(8),
        }
    }
}

/// Namespaced cache shared across all calls
pub struct CacheStore {
    scenarios: TtlCache<Arc<ScenarioDefinition>>,
    objections: TtlCache<Arc<ObjectionSet>>,
    models: TtlCache<ModelHandle>,
}

impl CacheStore {
    pub fn new(options: CacheStoreOptions) -> Self {
        Self {
            scenarios: TtlCache::new("scenarios", options.scenarios),
            objections: TtlCache::new("objections", options.objections),
            models: TtlCache::new("models", options.models),
        }
    }

    /// Loaded scenario definitions, keyed by scenario name
    pub fn scenarios(&self) -> &TtlCache<Arc<ScenarioDefinition>> {
        &self.scenarios
    }

    /// Merged objection sets, keyed by requested theme
    pub fn objections(&self) -> &TtlCache<Arc<ObjectionSet>> {
        &self.objections
    }

    /// Model and service handles, keyed by registration name
    pub fn models(&self) -> &TtlCache<ModelHandle> {
        &self.models
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheStoreOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::ScenarioMetadata;
    use std::collections::HashMap;

    fn scenario(name: &str) -> Arc<ScenarioDefinition> {
        Arc::new(ScenarioDefinition {
            name: name.to_string(),
            metadata: ScenarioMetadata {
                voice: "fr-1".into(),
                theme: "finance".into(),
                barge_in: true,
                rail: None,
            },
            variables: HashMap::new(),
            steps: HashMap::new(),
            entry_step: "intro".into(),
        })
    }

    #[test]
    fn test_namespaces_are_independent() {
        let store = CacheStore::default();
        store.scenarios().insert("demo", scenario("demo"));

        assert!(store.scenarios().get("demo").is_some());
        assert!(store.objections().get("demo").is_none());
    }

    #[test]
    fn test_model_handle_downcast() {
        let store = CacheStore::default();
        store
            .models()
            .insert("transcriber", Arc::new(42u32) as ModelHandle);

        let handle = store.models().get("transcriber").unwrap();
        assert_eq!(handle.downcast_ref::<u32>(), Some(&42));
    }
}
