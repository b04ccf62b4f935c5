//! Version Tracker: the persisted applied-revision marker.
//!
//! The marker lives in a single-row table inside the target database, so it
//! commits or rolls back together with each step. Zero rows means nothing is
//! applied. A companion log table records every step that ran.

use crate::connection::{execute_params, quote_ident, DuckDbConnection};
use crate::error::{DbError, DbResult};
use serde::Serialize;
use tm_core::{Direction, RevisionId, SchemaOps};

/// One applied or reverted step, as recorded in the log table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub revision: RevisionId,
    pub direction: Direction,
    /// Definition checksum at the time the step ran
    pub checksum: Option<String>,
    /// RFC 3339 timestamp
    pub applied_at: String,
}

/// Reads and writes the applied-revision marker.
pub trait VersionTracker {
    /// Create the backing tables if missing.
    fn ensure(&self, conn: &DuckDbConnection) -> DbResult<()>;

    /// Current marker; `None` when nothing is applied or the table is absent.
    fn read(&self, conn: &DuckDbConnection) -> DbResult<Option<RevisionId>>;

    /// Replace the marker. Runs inside the caller's transaction.
    fn write(&self, conn: &DuckDbConnection, marker: Option<&RevisionId>) -> DbResult<()>;

    /// Append a step to the log. Runs inside the caller's transaction.
    fn record(&self, conn: &DuckDbConnection, entry: &LogEntry) -> DbResult<()>;

    /// All logged steps, oldest first.
    fn log(&self, conn: &DuckDbConnection) -> DbResult<Vec<LogEntry>>;
}

/// Marker stored in a named table in the `main` schema.
#[derive(Debug, Clone)]
pub struct TableVersionTracker {
    table: String,
    log_table: String,
}

impl TableVersionTracker {
    /// Track in `table`, logging to `<table>_log`.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        let log_table = format!("{table}_log");
        Self { table, log_table }
    }

    /// Track in the tables named by the project configuration.
    pub fn from_config(config: &tm_core::Config) -> Self {
        Self {
            table: config.version_table.clone(),
            log_table: config.log_table(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn log_table(&self) -> &str {
        &self.log_table
    }

    fn exists(&self, conn: &DuckDbConnection, table: &str) -> DbResult<bool> {
        conn.table_exists(table)
            .map_err(|e| DbError::VersionTableError(e.to_string()))
    }
}

fn parse_revision(table: &str, value: String) -> DbResult<RevisionId> {
    RevisionId::try_new(value.clone()).ok_or_else(|| {
        DbError::VersionTableError(format!("{table} holds an invalid revision '{value}'"))
    })
}

fn parse_direction(value: &str) -> DbResult<Direction> {
    match value {
        "upgrade" => Ok(Direction::Upgrade),
        "downgrade" => Ok(Direction::Downgrade),
        other => Err(DbError::VersionTableError(format!(
            "unknown direction '{other}' in log"
        ))),
    }
}

impl VersionTracker for TableVersionTracker {
    fn ensure(&self, conn: &DuckDbConnection) -> DbResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                 revision VARCHAR NOT NULL
             );
             CREATE TABLE IF NOT EXISTS {} (
                 seq        BIGINT NOT NULL,
                 revision   VARCHAR NOT NULL,
                 direction  VARCHAR NOT NULL,
                 checksum   VARCHAR,
                 applied_at VARCHAR NOT NULL
             );",
            quote_ident(&self.table),
            quote_ident(&self.log_table)
        );
        conn.conn().execute_batch(&sql).map_err(|e| {
            DbError::VersionTableError(format!("failed to create {}: {e}", self.table))
        })
    }

    fn read(&self, conn: &DuckDbConnection) -> DbResult<Option<RevisionId>> {
        if !self.exists(conn, &self.table)? {
            return Ok(None);
        }
        let sql = format!("SELECT revision FROM {}", quote_ident(&self.table));
        let mut stmt = conn.conn().prepare(&sql)?;
        let mut values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        match values.len() {
            0 => Ok(None),
            1 => values
                .pop()
                .map(|v| parse_revision(&self.table, v))
                .transpose(),
            n => Err(DbError::VersionTableError(format!(
                "{} holds {n} rows; expected at most one",
                self.table
            ))),
        }
    }

    fn write(&self, conn: &DuckDbConnection, marker: Option<&RevisionId>) -> DbResult<()> {
        let table = quote_ident(&self.table);
        execute_params(conn, &format!("DELETE FROM {table}"), &[])?;
        if let Some(marker) = marker {
            execute_params(
                conn,
                &format!("INSERT INTO {table} (revision) VALUES (?)"),
                &[&marker.as_str()],
            )?;
        }
        log::debug!(
            "Marker set to {}",
            marker.map_or("base", |m| m.as_str())
        );
        Ok(())
    }

    fn record(&self, conn: &DuckDbConnection, entry: &LogEntry) -> DbResult<()> {
        let log_table = quote_ident(&self.log_table);
        let direction = entry.direction.to_string();
        execute_params(
            conn,
            &format!(
                "INSERT INTO {log_table} (seq, revision, direction, checksum, applied_at)
                 SELECT COALESCE(MAX(seq), 0) + 1, ?, ?, ?, ? FROM {log_table}"
            ),
            &[
                &entry.revision.as_str(),
                &direction,
                &entry.checksum,
                &entry.applied_at,
            ],
        )?;
        Ok(())
    }

    fn log(&self, conn: &DuckDbConnection) -> DbResult<Vec<LogEntry>> {
        if !self.exists(conn, &self.log_table)? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT revision, direction, checksum, applied_at FROM {} ORDER BY seq",
            quote_ident(&self.log_table)
        );
        let mut stmt = conn.conn().prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(revision, direction, checksum, applied_at)| {
                Ok(LogEntry {
                    revision: parse_revision(&self.log_table, revision)?,
                    direction: parse_direction(&direction)?,
                    checksum,
                    applied_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "tracker_test.rs"]
mod tests;
