use asha_field_core::sync::{SyncSettings, DEFAULT_RETRY_BUDGET};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_budget() -> u32 {
    DEFAULT_RETRY_BUDGET
}

/// Upper bound for `dashboard.recent_days` (about a century).
pub const MAX_RECENT_DAYS: i64 = 36_500;

fn default_recent_days() -> i64 {
    asha_field_core::aggregate::DEFAULT_RECENT_DAYS
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Server base URL (e.g., "http://10.10.100.167:8080/healthapp/api")
    pub base_url: Option<String>,
    /// API key sent as a Bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Failed attempts before a record is marked FAILED (default: 5)
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    /// Enable automatic sync after writes (default: false)
    #[serde(default)]
    pub auto_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            retry_budget: default_retry_budget(),
            auto_sync: false,
        }
    }
}

impl SyncConfig {
    /// Returns true if sync is configured (has a base_url)
    pub fn is_configured(&self) -> bool {
        self.base_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn settings(&self) -> SyncSettings {
        SyncSettings {
            retry_budget: self.retry_budget,
            request_timeout: self.timeout(),
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Days counted as recent activity (default: 7)
    #[serde(default = "default_recent_days")]
    pub recent_days: i64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            recent_days: default_recent_days(),
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Sync configuration
    pub sync: SyncConfig,
    /// Dashboard configuration
    pub dashboard: DashboardConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    sync: Option<SyncConfig>,
    dashboard: Option<DashboardConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("asha.db");

        // Start with defaults
        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut config_file = None;
        let mut sync = SyncConfig::default();
        let mut dashboard = DashboardConfig::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
            if let Some(dashboard_config) = file_config.dashboard {
                dashboard = dashboard_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("ASHA_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        // Sync env var overrides
        if let Ok(url) = std::env::var("ASHA_SYNC_URL") {
            sync.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("ASHA_SYNC_API_KEY") {
            sync.api_key = Some(key);
        }
        if let Ok(secs) = std::env::var("ASHA_SYNC_TIMEOUT_SECS") {
            sync.timeout_secs = parse_env("ASHA_SYNC_TIMEOUT_SECS", &secs)?;
        }
        if let Ok(budget) = std::env::var("ASHA_SYNC_RETRY_BUDGET") {
            sync.retry_budget = parse_env("ASHA_SYNC_RETRY_BUDGET", &budget)?;
        }

        if !(0..=MAX_RECENT_DAYS).contains(&dashboard.recent_days) {
            return Err(ConfigError::InvalidValue(
                "dashboard.recent_days".to_string(),
                dashboard.recent_days.to_string(),
            ));
        }

        Ok(Self {
            database_path,
            config_file,
            sync,
            dashboard,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/asha/
    /// - macOS: ~/Library/Application Support/asha/
    /// - Windows: %APPDATA%/asha/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("asha")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/asha/
    /// - macOS: ~/Library/Application Support/asha/
    /// - Windows: %APPDATA%/asha/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("asha")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }

    /// Recent-activity window for dashboards.
    pub fn recent_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.dashboard.recent_days)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string(), value.to_string()))
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(name, value) => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config
            .database_path
            .value
            .to_string_lossy()
            .contains("asha.db"));
        assert_eq!(config.database_path.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
        assert_eq!(config.sync.timeout_secs, 10);
        assert_eq!(config.sync.retry_budget, 5);
        assert!(!config.sync.auto_sync);
        assert_eq!(config.dashboard.recent_days, 7);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /custom/path/asha.sqlite").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  base_url: http://10.0.0.5:8080/healthapp/api").unwrap();
        writeln!(file, "  retry_budget: 3").unwrap();
        writeln!(file, "  auto_sync: true").unwrap();
        writeln!(file, "dashboard:").unwrap();
        writeln!(file, "  recent_days: 14").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(
            config.database_path.value,
            PathBuf::from("/custom/path/asha.sqlite")
        );
        assert_eq!(config.database_path.source, ConfigSource::File);
        assert_eq!(config.config_file, Some(config_path));
        assert!(config.sync.is_configured());
        assert_eq!(config.sync.retry_budget, 3);
        assert_eq!(config.sync.timeout_secs, 10);
        assert!(config.sync.auto_sync);
        assert_eq!(config.dashboard.recent_days, 14);
    }

    #[test]
    fn test_relative_database_path_resolved_against_config_dir() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "database_path: data/asha.db\n").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(
            config.database_path.value,
            temp_dir.path().join("data/asha.db")
        );
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /from/file.db").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  retry_budget: 3").unwrap();

        // Set env vars
        std::env::set_var("ASHA_DATABASE_PATH", "/from/env.db");
        std::env::set_var("ASHA_SYNC_RETRY_BUDGET", "8");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.database_path.value, PathBuf::from("/from/env.db"));
        assert_eq!(config.database_path.source, ConfigSource::Environment);
        assert_eq!(config.sync.retry_budget, 8);

        // Clean up
        std::env::remove_var("ASHA_DATABASE_PATH");
        std::env::remove_var("ASHA_SYNC_RETRY_BUDGET");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_negative_recent_days_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "dashboard:\n  recent_days: -1\n").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(err.to_string().contains("dashboard.recent_days"));
    }

    #[test]
    fn test_oversized_recent_days_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "dashboard:\n  recent_days: 100000000\n").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(err.to_string().contains("dashboard.recent_days"));
        assert!(err.to_string().contains("100000000"));
    }

    #[test]
    fn test_max_recent_days_accepted() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, format!("dashboard:\n  recent_days: {}\n", MAX_RECENT_DAYS))
            .unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.recent_window().num_days(), MAX_RECENT_DAYS);
    }

    #[test]
    fn test_sync_settings_from_config() {
        let sync = SyncConfig {
            timeout_secs: 0,
            retry_budget: 2,
            ..SyncConfig::default()
        };
        let settings = sync.settings();
        assert_eq!(settings.retry_budget, 2);
        assert_eq!(settings.request_timeout, Duration::from_secs(1));
        assert!(!sync.is_configured());
    }
}
