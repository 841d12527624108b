//! Strategy CRUD operations.

use chrono::Utc;
use tokio_rusqlite::{params, rusqlite};

use super::connection::Store;
use super::parse_timestamp;
use crate::Error;
use crate::strategy::{NewStrategy, Strategy};

const SELECT_COLUMNS: &str = "SELECT id, name, target_amount, active, filters, created_at, updated_at FROM strategies";

/// Strategy row before JSON and timestamp decoding.
struct RawStrategy {
    id: i64,
    name: String,
    target_amount: i64,
    active: bool,
    filters: String,
    created_at: String,
    updated_at: String,
}

impl RawStrategy {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            target_amount: row.get(2)?,
            active: row.get::<_, i64>(3)? != 0,
            filters: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Strategy, Error> {
        Ok(Strategy {
            id: self.id,
            name: self.name,
            target_amount: self.target_amount,
            active: self.active,
            filters: serde_json::from_str(&self.filters)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn not_found(id: i64) -> Error {
    Error::NotFound(format!("strategy {id}"))
}

impl Store {
    /// Validate and insert a new strategy.
    ///
    /// The name is trimmed and filter lists are normalized before storage.
    pub async fn create_strategy(&self, new: NewStrategy) -> Result<Strategy, Error> {
        let new = new.normalized();
        new.validate()?;
        let filters = serde_json::to_string(&new.filters)?;
        let now = Utc::now();

        let id = self
            .conn
            .call({
                let name = new.name.clone();
                let stamp = now.to_rfc3339();
                move |conn| -> Result<i64, Error> {
                    conn.execute(
                        "INSERT INTO strategies (name, target_amount, active, filters, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                        params![name, new.target_amount, new.active as i64, filters, stamp],
                    )?;
                    Ok(conn.last_insert_rowid())
                }
            })
            .await?;

        tracing::info!(strategy_id = id, name = %new.name, "created strategy");

        Ok(Strategy {
            id,
            name: new.name,
            target_amount: new.target_amount,
            active: new.active,
            filters: new.filters,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a strategy by id.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no strategy has this id.
    pub async fn get_strategy(&self, id: i64) -> Result<Strategy, Error> {
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawStrategy>, Error> {
                let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
                let result = conn.query_row(&sql, params![id], RawStrategy::from_row);
                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        raw.ok_or_else(|| not_found(id))?.decode()
    }

    /// All strategies, active first, then by name.
    pub async fn list_strategies(&self) -> Result<Vec<Strategy>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<RawStrategy>, Error> {
                let sql = format!("{SELECT_COLUMNS} ORDER BY active DESC, name COLLATE NOCASE, id");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], RawStrategy::from_row)?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(RawStrategy::decode).collect()
    }

    /// Number of strategies flagged active.
    pub async fn count_active_strategies(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM strategies WHERE active = 1", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Replace every user-editable field of a strategy.
    ///
    /// `created_at` is preserved and `updated_at` is bumped.
    pub async fn update_strategy(&self, id: i64, update: NewStrategy) -> Result<Strategy, Error> {
        let update = update.normalized();
        update.validate()?;
        let filters = serde_json::to_string(&update.filters)?;
        let stamp = Utc::now().to_rfc3339();

        let changed = self
            .conn
            .call({
                let name = update.name.clone();
                move |conn| -> Result<usize, Error> {
                    let changed = conn.execute(
                        "UPDATE strategies
                         SET name = ?1, target_amount = ?2, active = ?3, filters = ?4, updated_at = ?5
                         WHERE id = ?6",
                        params![name, update.target_amount, update.active as i64, filters, stamp, id],
                    )?;
                    Ok(changed)
                }
            })
            .await?;

        if changed == 0 {
            return Err(not_found(id));
        }

        tracing::info!(strategy_id = id, "updated strategy");
        self.get_strategy(id).await
    }

    /// Flip the active flag without touching the criteria.
    pub async fn set_strategy_active(&self, id: i64, active: bool) -> Result<Strategy, Error> {
        let stamp = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let changed = conn.execute(
                    "UPDATE strategies SET active = ?1, updated_at = ?2 WHERE id = ?3",
                    params![active as i64, stamp, id],
                )?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(not_found(id));
        }

        tracing::info!(strategy_id = id, active, "changed strategy state");
        self.get_strategy(id).await
    }

    /// Delete a strategy.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no strategy has this id.
    pub async fn delete_strategy(&self, id: i64) -> Result<(), Error> {
        let deleted = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                Ok(conn.execute("DELETE FROM strategies WHERE id = ?1", params![id])?)
            })
            .await?;

        if deleted == 0 {
            return Err(not_found(id));
        }

        tracing::info!(strategy_id = id, "deleted strategy");
        Ok(())
    }
}
