//! CLI configuration
//!
//! One TOML file per environment, e.g. `~/.config/switchover/staging.toml`:
//!
//! ```toml
//! api_endpoint = "https://api.example.com"
//! auth_token = "..."
//! publish_key = "pub-c-..."
//! subscribe_key = "sub-c-..."
//! ```

use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use switchover_migration::{CoordinatorConfig, DEFAULT_MAX_IN_FLIGHT, DEFAULT_TOMBSTONE_MESSAGE};
use switchover_types::Credential;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Registry API endpoint, without the `/v4` suffix
    pub api_endpoint: String,

    /// System bearer token
    pub auth_token: String,

    /// Notification publish key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_key: Option<String>,

    /// Notification subscribe key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe_key: Option<String>,

    /// Concurrent registry operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,

    /// Request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Tombstone text published after a migration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tombstone_message: Option<String>,
}

impl CliConfig {
    /// Pick the configuration file
    ///
    /// An explicit path wins; otherwise the environment name selects
    /// `<config_dir>/switchover/<env>.toml`. With neither there is nothing
    /// safe to default to.
    pub fn resolve_path(path: Option<&str>, env: Option<&str>) -> CliResult<PathBuf> {
        match (path, env) {
            (Some(p), _) => Ok(PathBuf::from(p)),
            (None, Some(env)) => {
                let config_dir = dirs::config_dir()
                    .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
                Ok(config_dir.join("switchover").join(format!("{}.toml", env)))
            }
            (None, None) => Err(CliError::Config(
                "No config file or environment is specified, bailing out".into(),
            )),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: CliConfig =
            toml::from_str(&contents).map_err(|e| CliError::Config(e.to_string()))?;

        if config.api_endpoint.trim().is_empty() {
            return Err(CliError::Config("api_endpoint must not be empty".into()));
        }
        Ok(config)
    }

    /// Write configuration back to file
    pub fn save(&self, path: &Path) -> CliResult<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn credential(&self) -> Credential {
        Credential::bearer(self.auth_token.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    /// Notification keys, when both are configured
    pub fn pubnub_keys(&self) -> Option<(&str, &str)> {
        match (&self.publish_key, &self.subscribe_key) {
            (Some(publish), Some(subscribe)) => Some((publish, subscribe)),
            _ => None,
        }
    }

    /// Explicit coordinator settings
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig::new(self.credential())
            .with_max_in_flight(self.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT))
            .with_tombstone_message(
                self.tombstone_message
                    .as_deref()
                    .unwrap_or(DEFAULT_TOMBSTONE_MESSAGE),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        api_endpoint = "https://api.example.com"
        auth_token = "system-token"
    "#;

    #[test]
    fn test_resolve_requires_path_or_env() {
        let err = CliConfig::resolve_path(None, None).unwrap_err();
        assert!(err.to_string().contains("bailing out"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = CliConfig::resolve_path(Some("/tmp/x.toml"), Some("staging")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/x.toml"));
    }

    #[test]
    fn test_env_selects_file() {
        if let Ok(path) = CliConfig::resolve_path(None, Some("staging")) {
            assert!(path.ends_with("switchover/staging.toml"));
        }
    }

    #[test]
    fn test_load_missing_config() {
        let err = CliConfig::load(Path::new("/nonexistent/path/config.toml")).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_defaults() {
        let config: CliConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.pubnub_keys().is_none());

        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert_eq!(coordinator.tombstone_message, DEFAULT_TOMBSTONE_MESSAGE);
        assert_eq!(coordinator.system_credential.token(), "system-token");
    }

    #[test]
    fn test_save_round_trips_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging.toml");
        let mut config: CliConfig = toml::from_str(MINIMAL).unwrap();
        config.auth_token = "refreshed".into();

        config.save(&path).unwrap();
        let loaded = CliConfig::load(&path).unwrap();
        assert_eq!(loaded.auth_token, "refreshed");
        assert_eq!(loaded.api_endpoint, "https://api.example.com");
    }
}
