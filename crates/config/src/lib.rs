//! Runtime settings
//!
//! Settings are layered: built-in defaults, an optional TOML file, then
//! `CALL_AGENT__`-prefixed environment variables. Everything is validated at
//! startup; a bad configuration aborts process start rather than surfacing
//! mid-call.

mod settings;

pub use settings::{
    AmdSettings, BargeInSettings, CacheSettings, ConfigError, DialSettings, EngineSettings,
    LimitSettings, ListenSettings, MatcherSettings, QualificationSettings, Settings,
};
