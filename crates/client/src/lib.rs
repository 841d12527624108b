//! Client code for lendboard.
//!
//! This crate provides the OAuth token manager, the paginated notes and
//! listings fetcher, and the synchronizer that mirrors both collections into
//! the local store. Shared by the web server and the CLI.

pub mod api;
pub mod auth;
pub mod error;
pub mod sync;

pub use api::{ApiClient, ApiConfig};
pub use auth::{AuthConfig, TokenManager, TokenPair};
pub use error::ApiError;
pub use sync::{CacheSynchronizer, CollectionOutcome, CollectionSource, SyncReport};
