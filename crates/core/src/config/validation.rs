//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::net::SocketAddr;

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `page_size` is 0 or exceeds 500
    /// - `sync_interval_secs` is under a minute or over a day
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `timezone` is empty
    /// - `api_base_url` is not an http(s) URL
    /// - `bind_addr` is not a socket address
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > 500 {
            return Err(ConfigError::Invalid { field: "page_size".into(), reason: "must be between 1 and 500".into() });
        }

        if self.sync_interval_secs < 60 {
            return Err(ConfigError::Invalid {
                field: "sync_interval_secs".into(),
                reason: "must be at least 60 seconds".into(),
            });
        }
        if self.sync_interval_secs > 86_400 {
            return Err(ConfigError::Invalid {
                field: "sync_interval_secs".into(),
                reason: "must not exceed one day (86400s)".into(),
            });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.timezone.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "timezone".into(), reason: "must not be empty".into() });
        }

        match url::Url::parse(&self.api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::Invalid {
                    field: "api_base_url".into(),
                    reason: format!("unsupported scheme: {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid { field: "api_base_url".into(), reason: e.to_string() });
            }
        }

        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "bind_addr".into(),
                reason: format!("not a socket address: {}", self.bind_addr),
            });
        }

        if self.api_base_url.starts_with("http://") {
            tracing::warn!(
                api_base_url = %self.api_base_url,
                "api_base_url is not https; credentials will be sent in clear text"
            );
        }

        Ok(())
    }
}
