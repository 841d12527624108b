//! Structured errors for the lendboard web UI.
//!
//! Every variant renders as an HTML error page with a matching status code.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use lendboard_core::Error;

use crate::templates;

/// Errors surfaced by route handlers.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Requested record does not exist.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Submitted data was rejected.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The lending API failed or rejected us.
    #[error("UPSTREAM_FAILED: {0}")]
    Upstream(String),

    /// Store or other internal failure.
    #[error("INTERNAL: {0}")]
    Internal(String),

    /// Template rendering failed.
    #[error("TEMPLATE_FAILED: {0}")]
    Template(#[from] minijinja::Error),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WebError::Upstream(_) => StatusCode::BAD_GATEWAY,
            WebError::Internal(_) | WebError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show in the page body.
    fn public_message(&self) -> String {
        match self {
            WebError::NotFound(msg) | WebError::InvalidInput(msg) | WebError::Upstream(msg) => msg.clone(),
            WebError::Internal(_) | WebError::Template(_) => "internal server error".into(),
        }
    }
}

impl From<Error> for WebError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => WebError::NotFound(msg),
            Error::InvalidInput(msg) => WebError::InvalidInput(msg),
            Error::AuthFailed(_) | Error::HttpError(_) | Error::ParseError(_) | Error::SyncAborted(_) => {
                WebError::Upstream(err.to_string())
            }
            Error::Database(_) | Error::MigrationFailed(_) | Error::Serialization(_) => {
                WebError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let ctx = serde_json::json!({
            "status": status.as_u16(),
            "reason": status.canonical_reason().unwrap_or("Error"),
            "message": self.public_message(),
        });

        match templates::render("error.html", ctx) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "failed to render error page");
                (status, self.public_message()).into_response()
            }
        }
    }
}
