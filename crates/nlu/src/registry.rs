//! Per-theme dataset loading
//!
//! Objection datasets live on disk as one JSON file per theme. The `general`
//! theme is merged into every requested theme, general entries first, so a
//! keyword collision resolves toward the general entry (first registration
//! wins in the matcher index). Merged sets are cached in the shared cache
//! store; matchers are built from the cached set per call.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use call_agent_cache::CacheStore;
use call_agent_core::{ObjectionEntry, ObjectionSet, GENERAL_THEME};

use crate::matcher::ObjectionMatcher;

/// Failure to produce a merged objection set
#[derive(Error, Debug)]
pub enum ObjectionLoadError {
    #[error("no dataset for theme '{0}'")]
    UnknownTheme(String),

    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Loads and caches per-theme objection sets, builds matchers on demand
pub struct MatcherRegistry {
    data_dir: PathBuf,
    cache: Arc<CacheStore>,
}

impl MatcherRegistry {
    pub fn new(data_dir: impl Into<PathBuf>, cache: Arc<CacheStore>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache,
        }
    }

    /// Merged set for a theme, from cache or disk
    pub fn load_set(&self, theme: &str) -> Result<Arc<ObjectionSet>, ObjectionLoadError> {
        if let Some(set) = self.cache.objections().get(theme) {
            return Ok(set);
        }

        let mut entries = Vec::new();

        // General entries first: they win keyword collisions by design
        if theme != GENERAL_THEME {
            match self.read_theme(GENERAL_THEME) {
                Ok(general) => entries.extend(general),
                Err(ObjectionLoadError::UnknownTheme(_)) => {
                    tracing::warn!(theme, "no general dataset to merge");
                }
                Err(e) => return Err(e),
            }
        }
        entries.extend(self.read_theme(theme)?);

        let set = Arc::new(ObjectionSet::new(theme, entries));
        self.cache.objections().insert(theme, Arc::clone(&set));
        tracing::info!(theme, entries = set.len(), "loaded objection dataset");
        Ok(set)
    }

    /// Build a matcher over the merged set for a theme
    pub fn matcher_for(&self, theme: &str) -> Result<ObjectionMatcher, ObjectionLoadError> {
        let set = self.load_set(theme)?;
        Ok(ObjectionMatcher::from_set(&set))
    }

    fn read_theme(&self, theme: &str) -> Result<Vec<ObjectionEntry>, ObjectionLoadError> {
        let path = self.data_dir.join(format!("{theme}.json"));
        if !path.exists() {
            return Err(ObjectionLoadError::UnknownTheme(theme.to_string()));
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ObjectionLoadError::Io {
            path: display(&path),
            source,
        })?;
        let mut entries: Vec<ObjectionEntry> =
            serde_json::from_str(&content).map_err(|source| ObjectionLoadError::Parse {
                path: display(&path),
                source,
            })?;
        for entry in &mut entries {
            entry.theme = theme.to_string();
        }
        Ok(entries)
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
