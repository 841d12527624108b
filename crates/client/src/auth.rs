//! OAuth token manager.
//!
//! Holds one access/refresh pair for the configured investor account and
//! exchanges credentials for it at the lending API's token endpoint.
//!
//! - **Endpoint**: `POST {base}/v1/security/oauth/token`, form-encoded.
//! - **Password grant**: `grant_type=password` with client and user credentials.
//! - **Refresh grant**: `grant_type=refresh_token`; the returned pair replaces
//!   the held pair wholesale.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lendboard_core::{AppConfig, Credentials};
use reqwest::header;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::ApiError;

/// Token endpoint path relative to the API base URL.
pub const TOKEN_PATH: &str = "/v1/security/oauth/token";

/// An access/refresh token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Token manager configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub credentials: Credentials,
    /// API base URL without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl AuthConfig {
    /// Build from the application config.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCredentials` naming the first absent field.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ApiError> {
        let credentials = config.require_credentials().map_err(|e| ApiError::MissingCredentials(e.to_string()))?;

        Ok(Self {
            credentials,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl OAuthErrorBody {
    fn reason(self, status: u16) -> String {
        self.error_description
            .filter(|s| !s.is_empty())
            .or(self.error)
            .unwrap_or_else(|| format!("token endpoint returned HTTP {status}"))
    }
}

/// Exchanges credentials for tokens and keeps the current pair.
#[derive(Debug)]
pub struct TokenManager {
    http: reqwest::Client,
    config: AuthConfig,
    tokens: RwLock<Option<TokenPair>>,
}

impl TokenManager {
    /// Create a token manager. No request is made until [`TokenManager::acquire`].
    pub fn new(config: AuthConfig) -> Result<Self, ApiError> {
        let creds = &config.credentials;
        for (name, value) in [
            ("client_id", &creds.client_id),
            ("client_secret", &creds.client_secret),
            ("username", &creds.username),
            ("password", &creds.password),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::MissingCredentials(name.to_string()));
            }
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Network(Arc::new(e)))?;

        Ok(Self { http, config, tokens: RwLock::new(None) })
    }

    /// Run the password grant and store the resulting pair.
    pub async fn acquire(&self) -> Result<TokenPair, ApiError> {
        let creds = &self.config.credentials;
        let form = [
            ("grant_type", "password"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("username", creds.username.as_str()),
            ("password", creds.password.as_str()),
        ];

        let pair = self.exchange(&form, None).await?;
        *self.tokens.write().await = Some(pair.clone());
        tracing::info!(username = %creds.username, "acquired access token");
        Ok(pair)
    }

    /// Run the refresh grant, falling back to the password grant.
    ///
    /// Without a held refresh token this is [`TokenManager::acquire`]. A refresh
    /// token rejected by the endpoint is dropped and the password grant runs once.
    pub async fn renew(&self) -> Result<TokenPair, ApiError> {
        let refresh = self
            .tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .filter(|t| !t.is_empty());

        let Some(refresh) = refresh else {
            tracing::debug!("no refresh token held, using password grant");
            return self.acquire().await;
        };

        let creds = &self.config.credentials;
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("refresh_token", refresh.as_str()),
        ];

        match self.exchange(&form, Some(&refresh)).await {
            Ok(pair) => {
                *self.tokens.write().await = Some(pair.clone());
                tracing::debug!("renewed access token");
                Ok(pair)
            }
            Err(ApiError::Auth(reason)) => {
                tracing::warn!(%reason, "refresh token rejected, re-authenticating");
                self.clear().await;
                self.acquire().await
            }
            Err(e) => Err(e),
        }
    }

    /// The current access token, `None` before the first successful exchange.
    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.access_token.clone())
    }

    /// Drop the held pair.
    pub async fn clear(&self) {
        *self.tokens.write().await = None;
    }

    async fn exchange(&self, form: &[(&str, &str)], previous_refresh: Option<&str>) -> Result<TokenPair, ApiError> {
        let url = format!("{}{TOKEN_PATH}", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(%status, "token endpoint response");

        if matches!(status.as_u16(), 400 | 401 | 403) {
            let body: OAuthErrorBody = response.json().await.unwrap_or_default();
            return Err(ApiError::Auth(body.reason(status.as_u16())));
        }

        if status == 429 {
            return Err(ApiError::RateLimited);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(ApiError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        let token: TokenResponse = serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(ApiError::Parse("token response has an empty access_token".into()));
        }

        let refresh_token = token
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();

        Ok(TokenPair { access_token: token.access_token, refresh_token })
    }
}
