//! SQLite-backed store for cached collections, strategies and sync history.
//!
//! This module provides persistence using SQLite with async access via
//! tokio-rusqlite. It supports:
//!
//! - Whole-table replacement of cached notes and listings in one transaction
//! - Strategy CRUD with JSON-encoded filter criteria
//! - A log of sync runs per collection
//! - Automatic schema migrations and WAL mode

pub mod cache;
pub mod connection;
pub mod migrations;
pub mod strategies;
pub mod sync_runs;

use chrono::{DateTime, Utc};

pub use crate::Error;

pub use cache::{CachedListing, CachedNote, Collection};
pub use connection::Store;
pub use sync_runs::{NewSyncRun, SyncRun, SyncStatus};

/// Parse a stored RFC 3339 timestamp.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("bad timestamp {value:?}: {e}")))
}
