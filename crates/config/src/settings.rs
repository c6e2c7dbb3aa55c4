//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error(transparent)]
    Source(#[from] config::ConfigError),
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Engine supervisor configuration
    #[serde(default)]
    pub engine: EngineSettings,

    /// Outbound dialing
    #[serde(default)]
    pub dial: DialSettings,

    /// Answering-machine detection
    #[serde(default)]
    pub amd: AmdSettings,

    /// Waiting-phase listening
    #[serde(default)]
    pub listen: ListenSettings,

    /// Barge-in monitoring
    #[serde(default)]
    pub barge_in: BargeInSettings,

    /// Failure-counter bounds
    #[serde(default)]
    pub limits: LimitSettings,

    /// Lead qualification
    #[serde(default)]
    pub qualification: QualificationSettings,

    /// Objection matcher thresholds
    #[serde(default)]
    pub matcher: MatcherSettings,

    /// Cache TTLs and capacities
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Engine supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum calls in flight; further originations are refused
    pub max_concurrent_calls: usize,
    /// How long shutdown waits for in-flight calls before aborting them
    pub shutdown_grace_secs: u64,
    /// Directory of scenario JSON documents
    pub scenario_dir: String,
    /// Directory of per-theme objection JSON datasets
    pub objection_dir: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 50,
            shutdown_grace_secs: 30,
            scenario_dir: "data/scenarios".into(),
            objection_dir: "data/objections".into(),
        }
    }
}

impl EngineSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Outbound dialing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialSettings {
    /// How long to let the destination ring before giving up
    pub ring_timeout_secs: u64,
}

impl Default for DialSettings {
    fn default() -> Self {
        Self {
            ring_timeout_secs: 30,
        }
    }
}

impl DialSettings {
    pub fn ring_timeout(&self) -> Duration {
        Duration::from_secs(self.ring_timeout_secs)
    }
}

/// Answering-machine detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmdSettings {
    /// Length of the greeting sample that is recorded and transcribed
    pub sample_ms: u64,
    /// Verdicts under this confidence downgrade to UNKNOWN
    pub min_confidence: f32,
    /// Phrases a human pickup tends to say
    pub human_keywords: Vec<String>,
    /// Phrases voicemail greetings tend to contain; these always outrank the
    /// human set when both match
    pub machine_keywords: Vec<String>,
}

impl Default for AmdSettings {
    fn default() -> Self {
        Self {
            sample_ms: 3_500,
            min_confidence: 0.6,
            human_keywords: vec![
                "allô".into(),
                "oui".into(),
                "bonjour".into(),
                "bonsoir".into(),
                "j'écoute".into(),
                "qui est à l'appareil".into(),
            ],
            machine_keywords: vec![
                "répondeur".into(),
                "messagerie".into(),
                "boîte vocale".into(),
                "laissez un message".into(),
                "après le bip".into(),
                "bip sonore".into(),
                "actuellement indisponible".into(),
            ],
        }
    }
}

impl AmdSettings {
    pub fn sample_duration(&self) -> Duration {
        Duration::from_millis(self.sample_ms)
    }
}

/// Waiting-phase configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenSettings {
    /// Continuous silence that ends the capture
    pub silence_threshold_ms: u64,
    /// Hard cap on one reply capture
    pub timeout_ms: u64,
    /// Captures shorter than this are silence, not transcribed
    pub min_capture_ms: u64,
    /// Voice-activity poll interval
    pub poll_interval_ms: u64,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            silence_threshold_ms: 1_500,
            timeout_ms: 10_000,
            min_capture_ms: 300,
            poll_interval_ms: 100,
        }
    }
}

impl ListenSettings {
    pub fn silence_threshold(&self) -> Duration {
        Duration::from_millis(self.silence_threshold_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_capture(&self) -> Duration {
        Duration::from_millis(self.min_capture_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Barge-in monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BargeInSettings {
    /// Continuous speech recognized as speech-start
    pub start_threshold_ms: u64,
    /// Continuous speech that triggers the interruption
    pub trigger_threshold_ms: u64,
    /// Delay between trigger and playback stop, for a natural fade
    pub smooth_delay_ms: u64,
    /// Voice-activity poll interval
    pub poll_interval_ms: u64,
}

impl Default for BargeInSettings {
    fn default() -> Self {
        Self {
            start_threshold_ms: 400,
            trigger_threshold_ms: 1_500,
            smooth_delay_ms: 500,
            poll_interval_ms: 100,
        }
    }
}

impl BargeInSettings {
    pub fn start_threshold(&self) -> Duration {
        Duration::from_millis(self.start_threshold_ms)
    }

    pub fn trigger_threshold(&self) -> Duration {
        Duration::from_millis(self.trigger_threshold_ms)
    }

    pub fn smooth_delay(&self) -> Duration {
        Duration::from_millis(self.smooth_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Failure-counter bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Consecutive silent replies before the forced failure transition
    pub max_consecutive_silence: u32,
    /// Consecutive unmatched replies before the forced failure transition
    pub max_consecutive_no_match: u32,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_consecutive_silence: 2,
            max_consecutive_no_match: 3,
        }
    }
}

/// Lead-qualification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationSettings {
    /// Fraction of visited qualifying weight that makes a lead
    pub threshold_fraction: f32,
}

impl Default for QualificationSettings {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.65,
        }
    }
}

/// Objection matcher thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
    /// Candidates below this score are rejected outright
    pub min_score: f32,
    /// Candidate list size considered after ranking
    pub top_n: usize,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            min_score: 0.55,
            top_n: 5,
        }
    }
}

/// Cache TTLs and capacities per namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub scenario_ttl_secs: u64,
    pub scenario_capacity: usize,
    pub objection_ttl_secs: u64,
    pub objection_capacity: usize,
    pub model_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            scenario_ttl_secs: 3_600,
            scenario_capacity: 50,
            objection_ttl_secs: 1_800,
            objection_capacity: 20,
            model_capacity: 8,
        }
    }
}

impl Settings {
    /// Layer defaults, an optional file and environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix("CALL_AGENT").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_concurrent_calls == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.max_concurrent_calls",
                message: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.qualification.threshold_fraction) {
            return Err(ConfigError::InvalidValue {
                field: "qualification.threshold_fraction",
                message: format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.qualification.threshold_fraction
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.matcher.min_score) {
            return Err(ConfigError::InvalidValue {
                field: "matcher.min_score",
                message: format!("must be between 0.0 and 1.0, got {}", self.matcher.min_score),
            });
        }
        if !(0.0..=1.0).contains(&self.amd.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "amd.min_confidence",
                message: format!("must be between 0.0 and 1.0, got {}", self.amd.min_confidence),
            });
        }
        if self.listen.silence_threshold_ms == 0 || self.listen.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "listen",
                message: "silence threshold and timeout must be non-zero".into(),
            });
        }
        if self.listen.silence_threshold_ms >= self.listen.timeout_ms {
            return Err(ConfigError::InvalidValue {
                field: "listen.silence_threshold_ms",
                message: "silence threshold must be below the hard timeout".into(),
            });
        }
        if self.barge_in.start_threshold_ms > self.barge_in.trigger_threshold_ms {
            return Err(ConfigError::InvalidValue {
                field: "barge_in.start_threshold_ms",
                message: "speech-start threshold cannot exceed the trigger threshold".into(),
            });
        }
        if self.listen.poll_interval_ms == 0 || self.barge_in.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms",
                message: "poll intervals must be non-zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.limits.max_consecutive_silence, 2);
        assert_eq!(settings.limits.max_consecutive_no_match, 3);
        assert_eq!(settings.barge_in.trigger_threshold(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_load_from_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call-agent.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[listen]\nsilence_threshold_ms = 2000\ntimeout_ms = 12000\nmin_capture_ms = 300\npoll_interval_ms = 100"
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.listen.silence_threshold_ms, 2_000);
        // Untouched sections keep their defaults
        assert_eq!(settings.amd.min_confidence, 0.6);
    }

    #[test]
    fn test_silence_threshold_must_undercut_timeout() {
        let mut settings = Settings::default();
        settings.listen.silence_threshold_ms = 20_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_threshold_fraction_bounds() {
        let mut settings = Settings::default();
        settings.qualification.threshold_fraction = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_amd_defaults_have_both_keyword_sets() {
        let amd = AmdSettings::default();
        assert!(amd.machine_keywords.iter().any(|k| k == "répondeur"));
        assert!(amd.human_keywords.iter().any(|k| k == "bonjour"));
    }
}
