//! Lending API client error types.

use std::sync::Arc;

use lendboard_core::Error;

/// Errors from the lending API client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// One or more OAuth credentials are empty.
    #[error("missing credentials: {0} not set")]
    MissingCredentials(String),

    /// A data request was attempted before any token exchange succeeded.
    #[error("not authenticated: no access token held")]
    NotAuthenticated,

    /// The token endpoint or a data endpoint rejected our credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Rate limited by the lending API.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Base URL could not be joined with an endpoint path.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether the failure came from credentials or tokens being rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_) | ApiError::NotAuthenticated | ApiError::MissingCredentials(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { ApiError::Timeout } else { ApiError::Network(Arc::new(err)) }
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        match err {
            err if err.is_auth() => Error::AuthFailed(err.to_string()),
            ApiError::Parse(msg) => Error::ParseError(msg),
            ApiError::InvalidUrl(msg) => Error::InvalidInput(msg),
            err => Error::HttpError(err.to_string()),
        }
    }
}
