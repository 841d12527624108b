//! Cache synchronizer.
//!
//! Refreshes the local notes and listings caches from a [`CollectionSource`].
//! Each collection is fetched and replaced independently; a failure leaves
//! that collection's previous cache in place and is recorded as a failed
//! sync run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lendboard_core::{CachedListing, CachedNote, Collection, Error, NewSyncRun, Store};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::ApiClient;
use crate::error::ApiError;

/// Sync runs kept after each cycle.
pub const DEFAULT_KEEP_RUNS: usize = 500;

/// Where cached records come from.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Make sure a valid session is held before fetching.
    async fn refresh_session(&self) -> Result<(), ApiError>;

    /// Every record of one collection.
    async fn fetch_all(&self, collection: Collection) -> Result<Vec<Value>, ApiError>;
}

#[async_trait]
impl CollectionSource for ApiClient {
    async fn refresh_session(&self) -> Result<(), ApiError> {
        self.tokens().renew().await.map(|_| ())
    }

    async fn fetch_all(&self, collection: Collection) -> Result<Vec<Value>, ApiError> {
        ApiClient::fetch_all(self, collection).await
    }
}

/// Result of syncing one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionOutcome {
    pub collection: Collection,
    /// Rows cached on success.
    pub row_count: Option<usize>,
    pub error: Option<String>,
}

impl CollectionOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of one sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<CollectionOutcome>,
}

impl SyncReport {
    /// Whether every collection synced.
    pub fn is_ok(&self) -> bool {
        self.outcomes.iter().all(CollectionOutcome::is_ok)
    }

    pub fn outcome(&self, collection: Collection) -> Option<&CollectionOutcome> {
        self.outcomes.iter().find(|o| o.collection == collection)
    }

    /// One-line human summary, e.g. `notes: 12 rows; listings: failed (HTTP error: 503)`.
    pub fn summary(&self) -> String {
        self.outcomes
            .iter()
            .map(|o| match (&o.row_count, &o.error) {
                (_, Some(err)) => format!("{}: failed ({err})", o.collection),
                (Some(n), None) => format!("{}: {n} rows", o.collection),
                (None, None) => format!("{}: ok", o.collection),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Refreshes the local cache from a source, one cycle at a time.
pub struct CacheSynchronizer {
    source: Arc<dyn CollectionSource>,
    store: Store,
    cycle: Mutex<()>,
    keep_runs: usize,
}

impl CacheSynchronizer {
    pub fn new(source: Arc<dyn CollectionSource>, store: Store) -> Self {
        Self { source, store, cycle: Mutex::new(()), keep_runs: DEFAULT_KEEP_RUNS }
    }

    /// Override how many sync runs survive pruning.
    pub fn with_keep_runs(mut self, keep_runs: usize) -> Self {
        self.keep_runs = keep_runs;
        self
    }

    /// Run one sync cycle over every collection.
    ///
    /// Concurrent callers wait for the running cycle to finish. Failures are
    /// reported per collection and recorded as sync runs; only store errors
    /// while recording are logged and swallowed.
    pub async fn run_once(&self) -> SyncReport {
        let _guard = self.cycle.lock().await;
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(Collection::ALL.len());

        if let Err(e) = self.source.refresh_session().await {
            tracing::warn!(error = %e, "session refresh failed, skipping sync cycle");
            let message = Error::SyncAborted(format!("session refresh failed: {e}")).to_string();
            for collection in Collection::ALL {
                self.record(NewSyncRun::failed(collection, started_at, message.clone())).await;
                outcomes.push(CollectionOutcome { collection, row_count: None, error: Some(message.clone()) });
            }
            return self.finish(started_at, outcomes).await;
        }

        for collection in Collection::ALL {
            let collection_started = Utc::now();
            let outcome = match self.sync_collection(collection).await {
                Ok(count) => {
                    tracing::info!(collection = %collection, rows = count, "cache refreshed");
                    self.record(NewSyncRun::succeeded(collection, collection_started, count)).await;
                    CollectionOutcome { collection, row_count: Some(count), error: None }
                }
                Err(e) => {
                    tracing::warn!(
                        collection = %collection,
                        code = e.code(),
                        error = %e,
                        "cache refresh failed, keeping previous rows"
                    );
                    let message = e.to_string();
                    self.record(NewSyncRun::failed(collection, collection_started, message.clone())).await;
                    CollectionOutcome { collection, row_count: None, error: Some(message) }
                }
            };
            outcomes.push(outcome);
        }

        self.finish(started_at, outcomes).await
    }

    /// Run [`CacheSynchronizer::run_once`] every `interval` on a background task.
    ///
    /// With `run_immediately` the first cycle starts at once, otherwise after
    /// one full interval. Missed ticks are skipped rather than bunched up.
    pub fn spawn(self: Arc<Self>, interval: Duration, run_immediately: bool) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            if !run_immediately {
                ticker.tick().await;
            }

            tracing::info!(interval_secs = interval.as_secs(), "sync loop started");

            loop {
                ticker.tick().await;
                let report = self.run_once().await;
                if report.is_ok() {
                    tracing::info!(summary = %report.summary(), "sync cycle complete");
                } else {
                    tracing::warn!(summary = %report.summary(), "sync cycle finished with errors");
                }
            }
        })
    }

    async fn sync_collection(&self, collection: Collection) -> Result<usize, Error> {
        let records = self.source.fetch_all(collection).await?;
        let cached_at = Utc::now();

        match collection {
            Collection::Notes => {
                let rows = records
                    .into_iter()
                    .map(|payload| CachedNote::from_payload(payload, cached_at))
                    .collect::<Result<Vec<_>, _>>()?;
                self.store.replace_notes(rows).await
            }
            Collection::Listings => {
                let rows = records
                    .into_iter()
                    .map(|payload| CachedListing::from_payload(payload, cached_at))
                    .collect::<Result<Vec<_>, _>>()?;
                self.store.replace_listings(rows).await
            }
        }
    }

    async fn record(&self, run: NewSyncRun) {
        if let Err(e) = self.store.record_sync_run(run).await {
            tracing::error!(error = %e, "failed to record sync run");
        }
    }

    async fn finish(&self, started_at: DateTime<Utc>, outcomes: Vec<CollectionOutcome>) -> SyncReport {
        match self.store.prune_sync_runs(self.keep_runs).await {
            Ok(0) => {}
            Ok(deleted) => tracing::debug!(deleted, "pruned sync runs"),
            Err(e) => tracing::error!(error = %e, "failed to prune sync runs"),
        }

        SyncReport { started_at, finished_at: Utc::now(), outcomes }
    }
}
