//! Sync run history.
//!
//! One row per attempted refresh of one collection. The dashboard reads the
//! latest row per collection to show cache age and the last failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::rusqlite::types::Value;
use tokio_rusqlite::{params, params_from_iter, rusqlite};

use super::cache::Collection;
use super::connection::Store;
use super::parse_timestamp;
use crate::Error;

/// Outcome of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Ok,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Ok => "ok",
            SyncStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "ok" => Ok(SyncStatus::Ok),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(Error::Serialization(format!("unknown sync status: {other}"))),
        }
    }
}

/// A recorded sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: i64,
    pub collection: Collection,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: SyncStatus,
    pub row_count: Option<i64>,
    pub error: Option<String>,
}

impl SyncRun {
    pub fn is_ok(&self) -> bool {
        self.status == SyncStatus::Ok
    }

    /// Wall-clock duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// A sync run about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncRun {
    pub collection: Collection,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: SyncStatus,
    pub row_count: Option<i64>,
    pub error: Option<String>,
}

impl NewSyncRun {
    /// A successful run finishing now.
    pub fn succeeded(collection: Collection, started_at: DateTime<Utc>, row_count: usize) -> Self {
        Self {
            collection,
            started_at,
            finished_at: Utc::now(),
            status: SyncStatus::Ok,
            row_count: Some(row_count as i64),
            error: None,
        }
    }

    /// A failed run finishing now.
    pub fn failed(collection: Collection, started_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            collection,
            started_at,
            finished_at: Utc::now(),
            status: SyncStatus::Failed,
            row_count: None,
            error: Some(error.into()),
        }
    }
}

type RawRun = (i64, String, String, String, String, Option<i64>, Option<String>);

fn decode(raw: RawRun) -> Result<SyncRun, Error> {
    let (id, collection, started_at, finished_at, status, row_count, error) = raw;
    Ok(SyncRun {
        id,
        collection: collection.parse()?,
        started_at: parse_timestamp(&started_at)?,
        finished_at: parse_timestamp(&finished_at)?,
        status: SyncStatus::parse(&status)?,
        row_count,
        error,
    })
}

fn raw_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRun> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?))
}

const SELECT_COLUMNS: &str =
    "SELECT id, collection, started_at, finished_at, status, row_count, error FROM sync_runs";

impl Store {
    /// Append a sync run. Returns the new row id.
    pub async fn record_sync_run(&self, run: NewSyncRun) -> Result<i64, Error> {
        self.conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT INTO sync_runs (collection, started_at, finished_at, status, row_count, error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        run.collection.as_str(),
                        run.started_at.to_rfc3339(),
                        run.finished_at.to_rfc3339(),
                        run.status.as_str(),
                        run.row_count,
                        run.error,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// The most recent run for each collection that has one.
    pub async fn latest_sync_runs(&self) -> Result<Vec<SyncRun>, Error> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE id IN (SELECT MAX(id) FROM sync_runs GROUP BY collection) ORDER BY collection"
        );
        self.query_runs(sql, Vec::new()).await
    }

    /// The most recent successful run of one collection.
    pub async fn last_successful_sync(&self, collection: Collection) -> Result<Option<SyncRun>, Error> {
        let runs = self
            .query_runs(
                format!("{SELECT_COLUMNS} WHERE collection = ?1 AND status = ?2 ORDER BY id DESC LIMIT 1"),
                vec![Value::Text(collection.as_str().into()), Value::Text(SyncStatus::Ok.as_str().into())],
            )
            .await?;
        Ok(runs.into_iter().next())
    }

    /// The newest `limit` runs across all collections.
    pub async fn recent_sync_runs(&self, limit: usize) -> Result<Vec<SyncRun>, Error> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_runs(format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"), vec![limit.into()]).await
    }

    /// Delete the oldest runs until at most `keep` remain.
    ///
    /// Returns the number of deleted rows.
    pub async fn prune_sync_runs(&self, keep: usize) -> Result<u64, Error> {
        let keep = keep as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute(
                    "DELETE FROM sync_runs WHERE id NOT IN (
                        SELECT id FROM sync_runs ORDER BY id DESC LIMIT ?1
                    )",
                    params![keep],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn query_runs(&self, sql: String, args: Vec<Value>) -> Result<Vec<SyncRun>, Error> {
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<RawRun>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(args), raw_from_row)?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_latest() {
        let store = Store::open_in_memory().await.unwrap();
        let started = Utc::now();

        store.record_sync_run(NewSyncRun::succeeded(Collection::Notes, started, 12)).await.unwrap();
        store.record_sync_run(NewSyncRun::failed(Collection::Notes, started, "HTTP 500")).await.unwrap();
        store.record_sync_run(NewSyncRun::succeeded(Collection::Listings, started, 300)).await.unwrap();

        let latest = store.latest_sync_runs().await.unwrap();
        assert_eq!(latest.len(), 2);

        let listings = latest.iter().find(|r| r.collection == Collection::Listings).unwrap();
        assert!(listings.is_ok());
        assert_eq!(listings.row_count, Some(300));

        let notes = latest.iter().find(|r| r.collection == Collection::Notes).unwrap();
        assert_eq!(notes.status, SyncStatus::Failed);
        assert_eq!(notes.error.as_deref(), Some("HTTP 500"));
        assert!(notes.duration_ms() >= 0);
    }

    #[tokio::test]
    async fn test_last_successful_skips_failures() {
        let store = Store::open_in_memory().await.unwrap();
        assert!(store.last_successful_sync(Collection::Notes).await.unwrap().is_none());

        store.record_sync_run(NewSyncRun::succeeded(Collection::Notes, Utc::now(), 3)).await.unwrap();
        store.record_sync_run(NewSyncRun::failed(Collection::Notes, Utc::now(), "timeout")).await.unwrap();

        let last = store.last_successful_sync(Collection::Notes).await.unwrap().unwrap();
        assert_eq!(last.row_count, Some(3));
    }

    #[tokio::test]
    async fn test_last_successful_is_per_collection() {
        let store = Store::open_in_memory().await.unwrap();
        store.record_sync_run(NewSyncRun::succeeded(Collection::Notes, Utc::now(), 8)).await.unwrap();
        store.record_sync_run(NewSyncRun::succeeded(Collection::Listings, Utc::now(), 2)).await.unwrap();
        store.record_sync_run(NewSyncRun::failed(Collection::Listings, Utc::now(), "HTTP 502")).await.unwrap();

        let notes = store.last_successful_sync(Collection::Notes).await.unwrap().unwrap();
        assert_eq!((notes.collection, notes.row_count), (Collection::Notes, Some(8)));
        let listings = store.last_successful_sync(Collection::Listings).await.unwrap().unwrap();
        assert_eq!((listings.collection, listings.row_count), (Collection::Listings, Some(2)));

        assert_eq!(store.recent_sync_runs(usize::MAX).await.unwrap().len(), 3);
        assert!(store.recent_sync_runs(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_and_prune() {
        let store = Store::open_in_memory().await.unwrap();
        for i in 0..5 {
            store.record_sync_run(NewSyncRun::succeeded(Collection::Listings, Utc::now(), i)).await.unwrap();
        }

        let recent = store.recent_sync_runs(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].row_count, Some(4));

        let deleted = store.prune_sync_runs(3).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.recent_sync_runs(10).await.unwrap().len(), 3);
    }
}
