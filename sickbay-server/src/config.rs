//! Service configuration
//!
//! Loaded from `~/.sickbay/config.toml` (or an explicit path), then
//! overridden by environment variables. A missing file is not an error:
//! defaults plus environment are enough to run against a local database.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::pool::DEFAULT_MAX_CONNECTIONS;
use crate::models::{AntiTheftPolicy, ValidationError};

/// Offline store URL (takes precedence over `DATABASE_URL`)
pub const ENV_OFFLINE_URL: &str = "SICKBAY_OFFLINE_DATABASE_URL";
/// Online store URL
pub const ENV_ONLINE_URL: &str = "SICKBAY_ONLINE_DATABASE_URL";
/// Bind address override
pub const ENV_BIND: &str = "SICKBAY_BIND";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_OFFLINE_URL: &str = "postgres://localhost/sickbay";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid [anti_theft] section: {0}")]
    AntiTheft(#[from] ValidationError),

    #[error("invalid bind address '{0}'")]
    Bind(String),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SickbayConfig {
    pub server: ServerSection,
    pub database: DatabaseConfig,
    pub anti_theft: AntiTheftPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    /// Allow any origin (local desktop front-ends)
    pub cors_permissive: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_owned(),
            cors_permissive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub offline_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            offline_url: DEFAULT_OFFLINE_URL.to_owned(),
            online_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl SickbayConfig {
    /// Default config file location: `~/.sickbay/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sickbay")
            .join("config.toml")
    }

    /// Load from `path` (or the default location) and apply the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; a missing file yields defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot constrain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.anti_theft.validate()?;
        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_OFFLINE_URL).or_else(|| non_empty("DATABASE_URL")) {
            self.database.offline_url = url;
        }
        if let Some(url) = non_empty(ENV_ONLINE_URL) {
            self.database.online_url = Some(url);
        }
        if let Some(bind) = non_empty(ENV_BIND) {
            self.server.bind = bind;
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|_| ConfigError::Bind(self.server.bind.clone()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SickbayConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, SickbayConfig::default());
        assert_eq!(config.anti_theft.threshold, 50);
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [database]
            online_url = "postgres://cloud/sickbay"

            [anti_theft]
            threshold = 20
            "#,
        )
        .unwrap();

        let config = SickbayConfig::from_file(&path).unwrap();
        assert_eq!(config.database.online_url.as_deref(), Some("postgres://cloud/sickbay"));
        assert_eq!(config.database.offline_url, DEFAULT_OFFLINE_URL);
        assert_eq!(config.anti_theft.threshold, 20);
        assert_eq!(config.anti_theft.window_hours, 24);
        assert_eq!(config.server.bind, DEFAULT_BIND);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nbind = ").unwrap();

        let err = SickbayConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    fn write_anti_theft(section: &str) -> Result<SickbayConfig, ConfigError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, format!("[anti_theft]\n{section}\n")).unwrap();
        SickbayConfig::from_file(&path)
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let err = write_anti_theft("threshold = -1").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::AntiTheft(ValidationError::OutOfRange { field: "threshold", .. })
        ));
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = write_anti_theft("window_hours = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::AntiTheft(ValidationError::OutOfRange { field: "window_hours", .. })
        ));
    }

    #[test]
    fn huge_window_is_rejected() {
        let err = write_anti_theft("window_hours = 4000000000\nthreshold = -1").unwrap_err();
        assert!(matches!(err, ConfigError::AntiTheft(_)));
        assert!(err.to_string().starts_with("invalid [anti_theft] section"));

        let err = write_anti_theft("window_hours = 8785").unwrap_err();
        assert!(matches!(err, ConfigError::AntiTheft(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = SickbayConfig::default();
        config.apply_env(env(&[
            ("DATABASE_URL", "postgres://fallback/db"),
            (ENV_OFFLINE_URL, "postgres://local/clinic"),
            (ENV_ONLINE_URL, "postgres://remote/clinic"),
            (ENV_BIND, "0.0.0.0:9000"),
        ]));

        assert_eq!(config.database.offline_url, "postgres://local/clinic");
        assert_eq!(config.database.online_url.as_deref(), Some("postgres://remote/clinic"));
        assert_eq!(config.bind_addr().unwrap().port(), 9000);
    }

    #[test]
    fn database_url_is_offline_fallback() {
        let mut config = SickbayConfig::default();
        config.apply_env(env(&[("DATABASE_URL", "postgres://fallback/db"), (ENV_BIND, "  ")]));

        assert_eq!(config.database.offline_url, "postgres://fallback/db");
        assert_eq!(config.server.bind, DEFAULT_BIND);
    }

    #[test]
    fn bad_bind_is_reported() {
        let mut config = SickbayConfig::default();
        config.server.bind = "not-an-addr".to_owned();
        assert!(matches!(config.bind_addr(), Err(ConfigError::Bind(_))));
    }

    #[test]
    fn toml_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = SickbayConfig::default();
        config.anti_theft.window_hours = 12;

        std::fs::write(&path, config.to_toml().unwrap()).unwrap();
        assert_eq!(SickbayConfig::from_file(&path).unwrap(), config);
    }
}
