//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LENDBOARD_*)
//! 2. TOML config file (if LENDBOARD_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_FILE_ENV: &str = "LENDBOARD_CONFIG_FILE";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LENDBOARD_";

/// When set, binaries emit JSON log lines.
pub const LOG_JSON_ENV: &str = "LENDBOARD_LOG_JSON";

/// String fields read from the environment verbatim, so values such as
/// `000123` or `true` are not coerced into numbers or booleans.
const VERBATIM_KEYS: &[&str] = &[
    "client_id",
    "client_secret",
    "username",
    "password",
    "api_base_url",
    "db_path",
    "bind_addr",
    "timezone",
    "user_agent",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LENDBOARD_*)
/// 2. TOML config file (if LENDBOARD_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// OAuth client id issued by the lending platform.
    ///
    /// Set via LENDBOARD_CLIENT_ID environment variable.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret.
    ///
    /// Set via LENDBOARD_CLIENT_SECRET environment variable.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Investor account username.
    ///
    /// Set via LENDBOARD_USERNAME environment variable.
    #[serde(default)]
    pub username: Option<String>,

    /// Investor account password.
    ///
    /// Set via LENDBOARD_PASSWORD environment variable.
    #[serde(default)]
    pub password: Option<String>,

    /// Base URL of the lending API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Path to the SQLite database.
    ///
    /// Set via LENDBOARD_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the web UI listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Seconds between background sync cycles.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Whether the first sync cycle runs immediately at startup.
    #[serde(default = "default_true")]
    pub sync_on_startup: bool,

    /// Records requested per page from the notes and listings endpoints.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Timezone header sent with data requests.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Credentials needed for the OAuth password grant.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_api_base_url() -> String {
    "https://api.prosper.com".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./lendboard.sqlite")
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".into()
}

fn default_sync_interval_secs() -> u64 {
    900
}

fn default_page_size() -> u32 {
    25
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_timezone() -> String {
    "America/Denver".into()
}

fn default_user_agent() -> String {
    "lendboard/0.1".into()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            api_base_url: default_api_base_url(),
            db_path: default_db_path(),
            bind_addr: default_bind_addr(),
            sync_interval_secs: default_sync_interval_secs(),
            sync_on_startup: true,
            page_size: default_page_size(),
            timeout_ms: default_timeout_ms(),
            timezone: default_timezone(),
            user_agent: default_user_agent(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("AppConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("api_base_url", &self.api_base_url)
            .field("db_path", &self.db_path)
            .field("bind_addr", &self.bind_addr)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("sync_on_startup", &self.sync_on_startup)
            .field("page_size", &self.page_size)
            .field("timeout_ms", &self.timeout_ms)
            .field("timezone", &self.timezone)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Interval between background sync cycles.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LENDBOARD_`
    /// 2. TOML file from `LENDBOARD_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered provider stack used by [`AppConfig::load`].
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var(CONFIG_FILE_ENV) {
            figment = figment.merge(Toml::file(&config_path));
        }

        let env = Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().into());
        let verbatim: BTreeMap<String, String> = env
            .clone()
            .only(VERBATIM_KEYS)
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value))
            .collect();

        figment
            .merge(env.ignore(&["config_file", "log_json"]).ignore(VERBATIM_KEYS))
            .merge(Serialized::defaults(verbatim))
    }

    /// Extract and validate a configuration from an arbitrary provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Collect the OAuth credentials (deferred validation).
    ///
    /// The web UI can run without credentials; only syncing needs them.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the first absent field.
    pub fn require_credentials(&self) -> Result<Credentials, ConfigError> {
        fn field(value: &Option<String>, name: &str) -> Result<String, ConfigError> {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| ConfigError::Missing {
                    field: name.into(),
                    hint: format!("Set {ENV_PREFIX}{} environment variable", name.to_uppercase()),
                })
        }

        Ok(Credentials {
            client_id: field(&self.client_id, "client_id")?,
            client_secret: field(&self.client_secret, "client_secret")?,
            username: field(&self.username, "username")?,
            password: field(&self.password, "password")?,
        })
    }

    /// Whether all credentials needed for syncing are present.
    pub fn has_credentials(&self) -> bool {
        self.require_credentials().is_ok()
    }
}
