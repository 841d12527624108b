//! Cached notes and listings.
//!
//! Both collections follow the same lifecycle: every successful sync
//! deletes the whole table and inserts the freshly fetched records in a
//! single transaction, so readers see either the previous snapshot or the
//! new one, never a mix.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_rusqlite::{params, rusqlite};

use super::connection::Store;
use super::parse_timestamp;
use crate::Error;

/// The two remote collections mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Notes,
    Listings,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Notes, Collection::Listings];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Notes => "notes",
            Collection::Listings => "listings",
        }
    }

    /// Payload field holding the record's unique key.
    pub fn key_field(self) -> &'static str {
        match self {
            Collection::Notes => "loan_note_id",
            Collection::Listings => "listing_number",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notes" => Ok(Collection::Notes),
            "listings" => Ok(Collection::Listings),
            other => Err(Error::InvalidInput(format!("unknown collection: {other}"))),
        }
    }
}

/// A cached loan listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedListing {
    pub listing_number: i64,
    pub payload: Value,
    pub last_cached_at: DateTime<Utc>,
}

/// A cached note owned by the investor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedNote {
    pub loan_note_id: String,
    pub payload: Value,
    pub last_cached_at: DateTime<Utc>,
}

impl CachedListing {
    /// Build a cache row from a raw API record.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseError` if `listing_number` is missing or not an integer.
    pub fn from_payload(payload: Value, cached_at: DateTime<Utc>) -> Result<Self, Error> {
        let listing_number = match payload.get(Collection::Listings.key_field()) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| Error::ParseError("listing record without an integer listing_number".into()))?;

        Ok(Self { listing_number, payload, last_cached_at: cached_at })
    }
}

impl CachedNote {
    /// Build a cache row from a raw API record.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseError` if `loan_note_id` is missing or empty.
    pub fn from_payload(payload: Value, cached_at: DateTime<Utc>) -> Result<Self, Error> {
        let loan_note_id = match payload.get(Collection::Notes.key_field()) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::ParseError("note record without a loan_note_id".into())),
        };

        Ok(Self { loan_note_id, payload, last_cached_at: cached_at })
    }
}

/// Row shape shared by both cache tables before the payload is decoded.
type RawRow<K> = (K, String, String);

fn decode<K>(row: RawRow<K>) -> Result<(K, Value, DateTime<Utc>), Error> {
    let (key, payload, cached_at) = row;
    Ok((key, serde_json::from_str(&payload)?, parse_timestamp(&cached_at)?))
}

impl Store {
    /// Replace the whole listings cache.
    ///
    /// Delete and insert run in one transaction; if anything fails the
    /// previous snapshot is kept. Duplicate listing numbers in `rows`
    /// collapse to the last occurrence.
    ///
    /// Returns the number of rows now cached.
    pub async fn replace_listings(&self, rows: Vec<CachedListing>) -> Result<usize, Error> {
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cached_listings", [])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR REPLACE INTO cached_listings (listing_number, payload, last_cached_at)
                         VALUES (?1, ?2, ?3)",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            row.listing_number,
                            row.payload.to_string(),
                            row.last_cached_at.to_rfc3339()
                        ])?;
                    }
                }
                let count: i64 = tx.query_row("SELECT COUNT(*) FROM cached_listings", [], |row| row.get(0))?;
                tx.commit()?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    /// Replace the whole notes cache. Same guarantees as [`Store::replace_listings`].
    pub async fn replace_notes(&self, rows: Vec<CachedNote>) -> Result<usize, Error> {
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cached_notes", [])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR REPLACE INTO cached_notes (loan_note_id, payload, last_cached_at)
                         VALUES (?1, ?2, ?3)",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            row.loan_note_id,
                            row.payload.to_string(),
                            row.last_cached_at.to_rfc3339()
                        ])?;
                    }
                }
                let count: i64 = tx.query_row("SELECT COUNT(*) FROM cached_notes", [], |row| row.get(0))?;
                tx.commit()?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    /// All cached listings, newest listing number first.
    pub async fn list_listings(&self) -> Result<Vec<CachedListing>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<RawRow<i64>>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT listing_number, payload, last_cached_at FROM cached_listings
                     ORDER BY listing_number DESC",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|raw| {
                let (listing_number, payload, last_cached_at) = decode(raw)?;
                Ok(CachedListing { listing_number, payload, last_cached_at })
            })
            .collect()
    }

    /// All cached notes ordered by note id.
    pub async fn list_notes(&self) -> Result<Vec<CachedNote>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<RawRow<String>>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT loan_note_id, payload, last_cached_at FROM cached_notes ORDER BY loan_note_id",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|raw| {
                let (loan_note_id, payload, last_cached_at) = decode(raw)?;
                Ok(CachedNote { loan_note_id, payload, last_cached_at })
            })
            .collect()
    }

    /// Get a cached listing by number.
    ///
    /// Returns None if the listing isn't cached.
    pub async fn get_listing(&self, listing_number: i64) -> Result<Option<CachedListing>, Error> {
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawRow<i64>>, Error> {
                let result = conn.query_row(
                    "SELECT listing_number, payload, last_cached_at FROM cached_listings WHERE listing_number = ?1",
                    params![listing_number],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        raw.map(|raw| {
            let (listing_number, payload, last_cached_at) = decode(raw)?;
            Ok(CachedListing { listing_number, payload, last_cached_at })
        })
        .transpose()
    }

    /// Get a cached note by id.
    ///
    /// Returns None if the note isn't cached.
    pub async fn get_note(&self, loan_note_id: &str) -> Result<Option<CachedNote>, Error> {
        let loan_note_id = loan_note_id.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawRow<String>>, Error> {
                let result = conn.query_row(
                    "SELECT loan_note_id, payload, last_cached_at FROM cached_notes WHERE loan_note_id = ?1",
                    params![loan_note_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        raw.map(|raw| {
            let (loan_note_id, payload, last_cached_at) = decode(raw)?;
            Ok(CachedNote { loan_note_id, payload, last_cached_at })
        })
        .transpose()
    }

    /// Number of cached rows in a collection.
    pub async fn count_cached(&self, collection: Collection) -> Result<u64, Error> {
        let sql = match collection {
            Collection::Notes => "SELECT COUNT(*) FROM cached_notes",
            Collection::Listings => "SELECT COUNT(*) FROM cached_listings",
        };
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count_listings(&self) -> Result<u64, Error> {
        self.count_cached(Collection::Listings).await
    }

    pub async fn count_notes(&self) -> Result<u64, Error> {
        self.count_cached(Collection::Notes).await
    }
}
