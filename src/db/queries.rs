use super::models::{RawWeek, StoreStats};
use super::{Database, DbError, Result};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

impl Database {
    /// Store a raw snapshot body under its chart date, replacing any earlier copy.
    pub fn put_snapshot(&self, date: &str, body: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO snapshots (date, body, ingested_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(date) DO UPDATE SET
                body = excluded.body,
                ingested_at = datetime('now')",
            params![date, body],
        )?;
        Ok(())
    }

    /// Load and parse the snapshot for one chart date.
    pub fn get_snapshot(&self, date: &str) -> Result<Option<RawWeek>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM snapshots WHERE date = ?1",
                params![date],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| {
            serde_json::from_str(&b).map_err(|source| DbError::Json {
                key: format!("snapshot {date}"),
                source,
            })
        })
        .transpose()
    }

    /// All stored chart dates, oldest first.
    pub fn snapshot_dates(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date FROM snapshots ORDER BY date")?;
        let dates = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(dates)
    }

    pub fn latest_snapshot_date(&self) -> Result<Option<String>> {
        let date = self
            .conn
            .query_row("SELECT MAX(date) FROM snapshots", [], |row| row.get(0))?;
        Ok(date)
    }

    /// Write a whole derived table.
    pub fn put_series<T: Serialize>(&self, name: &str, table: &T) -> Result<()> {
        let body = serde_json::to_string(table).map_err(|source| DbError::Json {
            key: format!("series {name}"),
            source,
        })?;
        self.conn.execute(
            "INSERT INTO series (name, body, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(name) DO UPDATE SET
                body = excluded.body,
                updated_at = datetime('now')",
            params![name, body],
        )?;
        Ok(())
    }

    /// Read a whole derived table, if it has been written before.
    pub fn get_series<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM series WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| {
            serde_json::from_str(&b).map_err(|source| DbError::Json {
                key: format!("series {name}"),
                source,
            })
        })
        .transpose()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let (snapshots, first_week, last_week) = self.conn.query_row(
            "SELECT COUNT(*), MIN(date), MAX(date) FROM snapshots",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT name, LENGTH(body) FROM series ORDER BY name")?;
        let tables: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(StoreStats {
            snapshots,
            first_week,
            last_week,
            tables,
        })
    }
}
