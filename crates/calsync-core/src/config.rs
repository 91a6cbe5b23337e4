use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// The authenticated user's default private calendar feed.
pub const DEFAULT_FEED: &str = "/calendar/feeds/default/private/full";

/// Feed and event identifiers share the mapping table's column width.
const MAX_FEED_LEN: usize = 255;

const ENV_PREFIX: &str = "CALSYNC";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Calendar account credentials
    #[serde(default)]
    pub account: AccountConfig,

    /// Remote calendar service settings
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Local mapping store settings
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account email used for ClientLogin
    #[serde(default)]
    pub email: String,

    /// Account password. Read from the file or `CALSYNC_ACCOUNT__PASSWORD`,
    /// never written back by `save()`.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Feed that receives events unless an adapter picks another one
    #[serde(default = "default_feed")]
    pub default_feed: String,

    /// Base URL that event ids and feed paths are resolved against
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// ClientLogin endpoint
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Transport timeout for every remote call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_feed() -> String {
    DEFAULT_FEED.to_string()
}

fn default_api_base_url() -> String {
    "https://www.google.com".to_string()
}

fn default_login_url() -> String {
    "https://www.google.com/accounts/ClientLogin".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            default_feed: default_feed(),
            api_base_url: default_api_base_url(),
            login_url: default_login_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding record -> event mappings
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calsync")
}

fn default_database_path() -> PathBuf {
    default_config_dir().join("mappings.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from the user config directory, creating a default
    /// file if it doesn't exist. Environment variables override file values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("Writing default configuration to {}", config_path.display());
            Self::default().save_to(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file, layered with `CALSYNC_*`
    /// environment variables.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_layered(path, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
    }

    fn load_layered(path: &Path, environment: config::Environment) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(environment)
            .build()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration and validate it.
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        validate_url(&self.calendar.api_base_url, "calendar.api_base_url", &mut result);
        validate_url(&self.calendar.login_url, "calendar.login_url", &mut result);

        let feed = &self.calendar.default_feed;
        if feed.trim().is_empty() {
            result.add_error("calendar.default_feed", "Default feed must not be empty");
        } else if feed.chars().count() > MAX_FEED_LEN {
            result.add_error(
                "calendar.default_feed",
                format!("Default feed is longer than {} characters", MAX_FEED_LEN),
            );
        }

        if self.calendar.request_timeout_secs == 0 {
            result.add_error(
                "calendar.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.calendar.request_timeout_secs > 300 {
            result.add_warning(
                "calendar.request_timeout_secs",
                "Request timeout is unusually long (>300s); saves will block that long",
            );
        }

        if self.account.email.trim().is_empty() {
            result.add_warning("account.email", "No account email - sync will fail to authenticate");
        }
        if self.account.password.as_deref().map_or(true, str::is_empty) {
            result.add_warning(
                "account.password",
                "No account password - set CALSYNC_ACCOUNT__PASSWORD",
            );
        }

        if self.storage.database_path.as_os_str().is_empty() {
            result.add_error("storage.database_path", "Database path must not be empty");
        }

        result
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFailed(e.to_string()))?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::WriteFailed(e.to_string()))?;

        std::fs::write(config_path, contents).map_err(|e| ConfigError::WriteFailed(e.to_string()))
    }

    /// Location of the user config file.
    pub fn config_path() -> PathBuf {
        default_config_dir().join("config.toml")
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }
            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }
        }
        Err(e) => result.add_error(field_name, format!("Invalid URL: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SyncConfig::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert_eq!(config.calendar.default_feed, DEFAULT_FEED);
    }

    #[test]
    fn test_missing_credentials_warn() {
        let result = SyncConfig::default().validate();
        assert!(result.warnings.iter().any(|w| w.field == "account.email"));
        assert!(result.warnings.iter().any(|w| w.field == "account.password"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = SyncConfig::default();
        config.calendar.login_url = "ftp://www.google.com/accounts/ClientLogin".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_overlong_feed() {
        let mut config = SyncConfig::default();
        config.calendar.default_feed = "f".repeat(256);
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "calendar.default_feed"));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = SyncConfig::default();
        config.calendar.request_timeout_secs = 0;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [account]
            email = "sync@example.com"
            password = "hunter2"

            [calendar]
            default_feed = "/calendar/feeds/team%40example.com/private/full"
            "#,
        )
        .unwrap();

        let config = SyncConfig::load_from(&path).unwrap();
        assert_eq!(config.account.email, "sync@example.com");
        assert_eq!(config.account.password.as_deref(), Some("hunter2"));
        assert_eq!(
            config.calendar.default_feed,
            "/calendar/feeds/team%40example.com/private/full"
        );
        // unspecified sections fall back to defaults
        assert_eq!(config.calendar.request_timeout_secs, 30);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [account]
            email = "sync@example.com"
            password = "from-file"
            "#,
        )
        .unwrap();

        let vars = config::Map::from([
            ("CALSYNC_ACCOUNT__PASSWORD".to_string(), "from-env".to_string()),
            (
                "CALSYNC_CALENDAR__DEFAULT_FEED".to_string(),
                "/calendar/feeds/rooms/private/full".to_string(),
            ),
            ("OTHER_ACCOUNT__EMAIL".to_string(), "ignored@example.com".to_string()),
        ]);
        let config =
            SyncConfig::load_layered(&path, SyncConfig::environment().source(Some(vars))).unwrap();

        assert_eq!(config.account.password.as_deref(), Some("from-env"));
        assert_eq!(config.account.email, "sync@example.com");
        assert_eq!(config.calendar.default_feed, "/calendar/feeds/rooms/private/full");
    }

    #[test]
    fn test_environment_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let vars = config::Map::from([(
            "CALSYNC_ACCOUNT__PASSWORD".to_string(),
            "from-env".to_string(),
        )]);

        let config = SyncConfig::load_layered(
            &dir.path().join("missing.toml"),
            SyncConfig::environment().source(Some(vars)),
        )
        .unwrap();

        assert_eq!(config.account.password.as_deref(), Some("from-env"));
        assert_eq!(config.calendar.request_timeout_secs, 30);
    }

    #[test]
    fn test_save_omits_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SyncConfig::default();
        config.account.email = "sync@example.com".to_string();
        config.account.password = Some("hunter2".to_string());
        config.save_to(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("sync@example.com"));
        assert!(!written.contains("hunter2"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let account = AccountConfig {
            email: "sync@example.com".to_string(),
            password: Some("hunter2".to_string()),
        };
        assert!(!format!("{:?}", account).contains("hunter2"));
    }
}
