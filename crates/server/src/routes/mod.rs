//! HTTP routes.
//!
//! Pages read only the local store; the lending API is touched by the
//! synchronizer alone.

use axum::Router;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::WebError;
use crate::state::AppState;
use crate::templates;

pub mod collections;
pub mod dashboard;
pub mod health;
pub mod strategies;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/sync", post(dashboard::sync_now))
        .route("/notes", get(collections::notes))
        .route("/listings", get(collections::listings))
        .route("/strategies", get(strategies::index).post(strategies::create))
        .route("/strategies/new", get(strategies::new_form))
        .route("/strategies/{id}", get(strategies::show).post(strategies::update))
        .route("/strategies/{id}/edit", get(strategies::edit_form))
        .route("/strategies/{id}/toggle", post(strategies::toggle))
        .route("/strategies/{id}/delete", post(strategies::delete))
        .route("/health", get(health::health_check))
        .with_state(state)
}

/// One-shot message carried across a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    #[serde(default)]
    pub notice: Option<String>,
}

/// 303 redirect to `path` with a notice for the next page.
pub fn redirect_with_notice(path: &str, notice: &str) -> Redirect {
    let encoded: String = url::form_urlencoded::byte_serialize(notice.as_bytes()).collect();
    Redirect::to(&format!("{path}?notice={encoded}"))
}

pub fn display_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn render_page<T: serde::Serialize>(name: &str, ctx: T) -> Result<Html<String>, WebError> {
    Ok(Html(templates::render(name, ctx)?))
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use lendboard_core::Store;
    use tower::ServiceExt;

    use super::router;
    use crate::state::AppState;

    pub async fn state() -> AppState {
        AppState::new(Store::open_in_memory().await.unwrap(), None)
    }

    /// Send a request and return status, `Location` header and body text.
    pub async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Option<String>, String) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, location, String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}
