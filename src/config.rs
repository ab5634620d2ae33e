//! Clock configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! base_url = "http://worldtimeapi.org/api"
//! default_timezone = "Asia/Kolkata"
//! tick_interval_ms = 1000
//! resync_interval_secs = 30
//! request_timeout_ms = 5000
//! ```

use core::time::Duration;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Root of the time service API, without a trailing slash.
    pub base_url: String,

    /// Zone a fresh clock selects when the caller names none.
    pub default_timezone: String,

    pub tick_interval_ms: u64,

    pub resync_interval_secs: u64,

    /// Upper bound on a single resolver request. Must stay below the resync cadence.
    pub request_timeout_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            base_url: "http://worldtimeapi.org/api".to_string(),
            default_timezone: "Asia/Kolkata".to_string(),
            tick_interval_ms: 1000,
            resync_interval_secs: 30,
            request_timeout_ms: 5000,
        }
    }
}

impl ClockConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ClockConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.resync_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "resync_interval_secs must be positive".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive".into(),
            ));
        }
        if self.request_timeout() >= self.resync_interval() {
            return Err(ConfigError::Invalid(format!(
                "request_timeout_ms ({}) must be shorter than the resync interval ({}s)",
                self.request_timeout_ms, self.resync_interval_secs
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ClockConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClockConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn overrides_individual_fields() {
        let config = ClockConfig::from_toml_str(
            r#"
            default_timezone = "Europe/Paris"
            resync_interval_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.default_timezone, "Europe/Paris");
        assert_eq!(config.resync_interval(), Duration::from_secs(60));
        assert_eq!(config.request_timeout_ms, 5000);
    }

    #[test]
    fn timeout_must_be_shorter_than_resync_cadence() {
        let result = ClockConfig::from_toml_str(
            r#"
            resync_interval_secs = 5
            request_timeout_ms = 5000
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_tick_and_unknown_keys() {
        assert!(matches!(
            ClockConfig::from_toml_str("tick_interval_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClockConfig::from_toml_str("tick_every = 5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClockConfig::load("/nonexistent/zone-clock.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/zone-clock.toml"));
    }
}
