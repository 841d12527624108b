//! Unified error types for lendboard.
//!
//! Every variant renders with a stable code prefix so log lines and error
//! pages can be grepped by failure class.

use tokio_rusqlite::rusqlite;

/// Unified error types for the lendboard crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a malformed strategy form).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No record found for the given key.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored JSON could not be encoded or decoded.
    #[error("STORE_ERROR: invalid stored json: {0}")]
    Serialization(String),

    /// The lending API rejected our credentials or tokens.
    #[error("AUTH_FAILED: {0}")]
    AuthFailed(String),

    /// HTTP error talking to the lending API.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// The lending API returned a body we could not interpret.
    #[error("PARSE_ERROR: {0}")]
    ParseError(String),

    /// A sync cycle was abandoned before it replaced any cache.
    #[error("SYNC_ABORTED: {0}")]
    SyncAborted(String),
}

impl Error {
    /// Short machine-readable code, the prefix of the display form.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Database(_) | Error::MigrationFailed(_) | Error::Serialization(_) => "STORE_ERROR",
            Error::AuthFailed(_) => "AUTH_FAILED",
            Error::HttpError(_) => "HTTP_ERROR",
            Error::ParseError(_) => "PARSE_ERROR",
            Error::SyncAborted(_) => "SYNC_ABORTED",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
