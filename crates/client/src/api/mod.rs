//! Lending API data client.
//!
//! Pages through the notes and listings endpoints with the token held by a
//! [`TokenManager`] and returns the raw records.
//!
//! - **Notes**: `GET {base}/v1/notes/`
//! - **Listings**: `GET {base}/listingsvc/v2/listings/`
//! - **Paging**: `offset`/`limit` query parameters, envelope
//!   `{result, result_count, total_count}`.
//! - **Headers**: `authorization: bearer <token>`, `accept`, `timezone`.
//!
//! No retries: a failed page fails the whole collection fetch.

pub mod response;

pub use response::Page;

use std::sync::Arc;
use std::time::{Duration, Instant};

use lendboard_core::{AppConfig, Collection};
use reqwest::header;
use serde_json::Value;
use url::Url;

use crate::auth::{AuthConfig, TokenManager};
use crate::error::ApiError;

/// Notes endpoint path.
pub const NOTES_PATH: &str = "/v1/notes/";

/// Listings endpoint path.
pub const LISTINGS_PATH: &str = "/listingsvc/v2/listings/";

/// Default upper bound on pages fetched for one collection.
pub const DEFAULT_MAX_PAGES: usize = 1_000;

/// Data client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Records requested per page.
    pub page_size: u32,
    /// Sent as the `timezone` header.
    pub timezone: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Pagination stops after this many pages even if the server reports more.
    pub max_pages: usize,
}

impl ApiConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            timezone: config.timezone.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Path of the endpoint serving a collection.
pub fn endpoint_path(collection: Collection) -> &'static str {
    match collection {
        Collection::Notes => NOTES_PATH,
        Collection::Listings => LISTINGS_PATH,
    }
}

/// Client for the notes and listings endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    /// Create a client that authenticates with `tokens`.
    pub fn new(config: ApiConfig, tokens: Arc<TokenManager>) -> Result<Self, ApiError> {
        Url::parse(&config.base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.base_url)))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Network(Arc::new(e)))?;

        Ok(Self { http, config, tokens })
    }

    /// Build the token manager and data client from the application config.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingCredentials` when any credential is absent.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ApiError> {
        let tokens = TokenManager::new(AuthConfig::from_app_config(config)?)?;
        Self::new(ApiConfig::from_app_config(config), Arc::new(tokens))
    }

    /// The token manager this client authenticates with.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Fetch every record of a collection, following pagination.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotAuthenticated` when no token is held, or the
    /// first page error encountered.
    pub async fn fetch_all(&self, collection: Collection) -> Result<Vec<Value>, ApiError> {
        let token = self.tokens.access_token().await.ok_or(ApiError::NotAuthenticated)?;
        let url = Url::parse(&format!("{}{}", self.config.base_url, endpoint_path(collection)))
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        let limit = self.config.page_size;
        let start = Instant::now();

        let mut records = Vec::new();
        let mut pages = 0;

        loop {
            let page = self.fetch_page(&url, &token, records.len(), limit).await?;
            pages += 1;

            let total_count = page.total_count;
            let batch = page.into_records();
            let received = batch.len();
            records.extend(batch);

            if !response::has_more(received, records.len(), limit, total_count) {
                break;
            }
            if pages >= self.config.max_pages {
                tracing::warn!(collection = %collection, pages, "page cap reached, stopping pagination");
                break;
            }
        }

        tracing::debug!(
            collection = %collection,
            pages,
            records = records.len(),
            elapsed = ?start.elapsed(),
            "fetched collection"
        );

        Ok(records)
    }

    async fn fetch_page(&self, url: &Url, token: &str, offset: usize, limit: u32) -> Result<Page, ApiError> {
        let response = self
            .http
            .get(url.clone())
            .header(header::AUTHORIZATION, format!("bearer {token}"))
            .header(header::ACCEPT, "application/json")
            .header("timezone", &self.config.timezone)
            .query(&[("offset", offset.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(%url, offset, %status, "page response");

        if status == 401 || status == 403 {
            return Err(ApiError::Auth(format!("{} rejected the access token", url.path())));
        }

        if status == 429 {
            return Err(ApiError::RateLimited);
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(ApiError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        Page::parse(&bytes).map_err(|e| ApiError::Parse(format!("{}: {e}", url.path())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TOKEN_PATH;
    use lendboard_core::Credentials;
    use serde_json::json;
    use wiremock::matchers::{header as header_matcher, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer, page_size: u32) -> ApiClient {
        client_with_cap(server, page_size, DEFAULT_MAX_PAGES).await
    }

    async fn client_with_cap(server: &MockServer, page_size: u32, max_pages: usize) -> ApiClient {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "refresh_token": "ref"
            })))
            .mount(server)
            .await;

        let auth = AuthConfig {
            credentials: Credentials {
                client_id: "cid".into(),
                client_secret: "cs".into(),
                username: "u".into(),
                password: "p".into(),
            },
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            user_agent: "lendboard-test".into(),
        };
        let tokens = Arc::new(TokenManager::new(auth).unwrap());
        let config = ApiConfig {
            base_url: server.uri(),
            page_size,
            timezone: "America/Denver".into(),
            timeout: Duration::from_secs(5),
            user_agent: "lendboard-test".into(),
            max_pages,
        };
        ApiClient::new(config, tokens).unwrap()
    }

    fn listings(range: std::ops::Range<i64>) -> Vec<Value> {
        range.map(|n| json!({"listing_number": n, "prosper_rating": "A"})).collect()
    }

    #[tokio::test]
    async fn test_fetch_requires_token() {
        let server = MockServer::start().await;
        let client = client(&server, 25).await;
        let result = client.fetch_all(Collection::Notes).await;
        assert!(matches!(result, Err(ApiError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_fetch_sends_headers() {
        let server = MockServer::start().await;
        let client = client(&server, 25).await;
        client.tokens().acquire().await.unwrap();

        Mock::given(method("GET"))
            .and(path(NOTES_PATH))
            .and(header_matcher("authorization", "bearer tok"))
            .and(header_matcher("accept", "application/json"))
            .and(header_matcher("timezone", "America/Denver"))
            .and(query_param("offset", "0"))
            .and(query_param("limit", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"loan_note_id": "1-1"}, {"loan_note_id": "1-2"}],
                "result_count": 2,
                "total_count": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let notes = client.fetch_all(Collection::Notes).await.unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1]["loan_note_id"], "1-2");
    }

    #[tokio::test]
    async fn test_fetch_follows_total_count() {
        let server = MockServer::start().await;
        let client = client(&server, 2).await;
        client.tokens().acquire().await.unwrap();

        for (offset, range) in [("0", 0..2), ("2", 2..4), ("4", 4..5)] {
            Mock::given(method("GET"))
                .and(path(LISTINGS_PATH))
                .and(query_param("offset", offset))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "result": listings(range),
                    "total_count": 5
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let records = client.fetch_all(Collection::Listings).await.unwrap();
        let numbers: Vec<i64> = records.iter().map(|r| r["listing_number"].as_i64().unwrap()).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_fetch_stops_on_short_page_without_total() {
        let server = MockServer::start().await;
        let client = client(&server, 3).await;
        client.tokens().acquire().await.unwrap();

        Mock::given(method("GET"))
            .and(path(LISTINGS_PATH))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": listings(0..3)})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LISTINGS_PATH))
            .and(query_param("offset", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": listings(3..4)})))
            .expect(1)
            .mount(&server)
            .await;

        let records = client.fetch_all(Collection::Listings).await.unwrap();
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_empty_collection() {
        let server = MockServer::start().await;
        let client = client(&server, 25).await;
        client.tokens().acquire().await.unwrap();

        Mock::given(method("GET"))
            .and(path(NOTES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": [], "total_count": 0})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client.fetch_all(Collection::Notes).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_statuses() {
        let server = MockServer::start().await;
        let client = client(&server, 25).await;
        client.tokens().acquire().await.unwrap();

        Mock::given(method("GET"))
            .and(path(NOTES_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(LISTINGS_PATH))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        assert!(matches!(client.fetch_all(Collection::Notes).await, Err(ApiError::Auth(_))));
        assert!(matches!(
            client.fetch_all(Collection::Listings).await,
            Err(ApiError::HttpError { status: 502 })
        ));
    }

    #[tokio::test]
    async fn test_fetch_stops_at_page_cap() {
        let server = MockServer::start().await;
        let client = client_with_cap(&server, 2, 3).await;
        client.tokens().acquire().await.unwrap();

        Mock::given(method("GET"))
            .and(path(LISTINGS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": listings(0..2)})))
            .expect(3)
            .mount(&server)
            .await;

        let records = client.fetch_all(Collection::Listings).await.unwrap();
        assert_eq!(records.len(), 6);
    }

    #[tokio::test]
    async fn test_fetch_rate_limited() {
        let server = MockServer::start().await;
        let client = client(&server, 25).await;
        client.tokens().acquire().await.unwrap();

        Mock::given(method("GET"))
            .and(path(NOTES_PATH))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        assert!(matches!(client.fetch_all(Collection::Notes).await, Err(ApiError::RateLimited)));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let server = MockServer::start().await;
        let client = client(&server, 25).await;
        client.tokens().acquire().await.unwrap();

        Mock::given(method("GET"))
            .and(path(NOTES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        assert!(matches!(client.fetch_all(Collection::Notes).await, Err(ApiError::Parse(_))));
    }

    #[test]
    fn test_invalid_base_url() {
        let auth = AuthConfig {
            credentials: Credentials {
                client_id: "a".into(),
                client_secret: "b".into(),
                username: "c".into(),
                password: "d".into(),
            },
            base_url: "nope".into(),
            timeout: Duration::from_secs(1),
            user_agent: "t".into(),
        };
        let tokens = Arc::new(TokenManager::new(auth).unwrap());
        let config = ApiConfig {
            base_url: "not a url".into(),
            page_size: 25,
            timezone: "UTC".into(),
            timeout: Duration::from_secs(1),
            user_agent: "t".into(),
            max_pages: DEFAULT_MAX_PAGES,
        };
        assert!(matches!(ApiClient::new(config, tokens), Err(ApiError::InvalidUrl(_))));
    }
}
