//! Engine configuration.
//!
//! Strongly-typed configuration for the engine, loaded via the `config`
//! crate from environment variables (e.g. `POLL__MAX_POLLS=45`).

use serde::Deserialize;
use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Public base URL of the platform, used to build deep links into
    /// failing child executions. No links are produced when unset.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bounds for synchronous child-execution polling.
    #[serde(default)]
    pub poll: PollSettings,
}

/// Bounds for the sub-workflow completion poll loop.
#[derive(Debug, Clone, Deserialize)]
pub struct PollSettings {
    /// Maximum number of status polls before giving up.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Seconds between status polls.
    #[serde(default = "default_poll_interval_seconds")]
    pub interval_seconds: u64,
}

fn default_max_polls() -> u32 {
    30
}

fn default_poll_interval_seconds() -> u64 {
    2
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_polls: default_max_polls(),
            interval_seconds: default_poll_interval_seconds(),
        }
    }
}

impl PollSettings {
    /// Returns the poll interval as a duration.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl EngineConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if present configuration fails to parse.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Builds a deep link to an execution, when a base URL is configured.
    #[must_use]
    pub fn execution_link(&self, execution_id: switchyard_core::ExecutionId) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}/executions/{execution_id}", base.trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::ExecutionId;

    #[test]
    fn poll_settings_have_documented_defaults() {
        let settings = PollSettings::default();
        assert_eq!(settings.max_polls, 30);
        assert_eq!(settings.interval_seconds, 2);
        assert_eq!(settings.interval(), Duration::from_secs(2));
    }

    #[test]
    fn execution_link_requires_base_url() {
        let mut config = EngineConfig::default();
        let execution_id = ExecutionId::new();
        assert!(config.execution_link(execution_id).is_none());

        config.base_url = Some("https://app.example.com/".to_string());
        let link = config.execution_link(execution_id).unwrap();
        assert_eq!(
            link,
            format!("https://app.example.com/executions/{execution_id}")
        );
    }
}
