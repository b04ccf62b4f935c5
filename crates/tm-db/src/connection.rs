//! DuckDB connection wrapper.
//!
//! [`DuckDbConnection`] owns a DuckDB [`Connection`], exposes the
//! [`SchemaOps`] surface to migration actions, and wraps each migration step
//! in its own transaction.

use crate::error::{DbError, DbResult};
use duckdb::Connection;
use std::path::Path;
use tm_core::{ActionError, ActionResult, SchemaOps};

/// Path value that opens an in-memory database
pub const MEMORY_PATH: &str = ":memory:";

/// Connection to the target database.
///
/// Single-threaded: steps run sequentially, so no `Mutex` is needed.
pub struct DuckDbConnection {
    conn: Connection,
}

impl DuckDbConnection {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Open (or create) a DuckDB file
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self { conn })
    }

    /// Create from path string (handles :memory: special case)
    pub fn open(path: &str) -> DbResult<Self> {
        if path == MEMORY_PATH {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    /// Borrow the underlying DuckDB connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute `body` within a `BEGIN` / `COMMIT` transaction.
    ///
    /// Anything other than a successful commit rolls back, including a panic
    /// inside `body`.
    pub fn transaction<F, T>(&self, body: F) -> DbResult<T>
    where
        F: FnOnce(&Self) -> DbResult<T>,
    {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {e}")))?;

        let mut guard = RollbackGuard {
            conn: &self.conn,
            committed: false,
        };
        let value = body(self)?;
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| DbError::TransactionError(format!("COMMIT failed: {e}")))?;
        guard.committed = true;
        Ok(value)
    }

    /// Count rows matching a parameterized `SELECT COUNT(*)` query.
    fn count(&self, sql: &str, args: &[&str]) -> ActionResult<i64> {
        self.conn
            .query_row(sql, duckdb::params_from_iter(args.iter()), |row| row.get(0))
            .map_err(|e| sql_error(sql, e))
    }
}

/// Rolls back an open transaction unless it was committed.
struct RollbackGuard<'c> {
    conn: &'c Connection,
    committed: bool,
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("ROLLBACK failed: {e}");
            }
        }
    }
}

fn sql_error(sql: &str, err: duckdb::Error) -> ActionError {
    ActionError::Sql {
        sql: sql.trim().to_string(),
        message: err.to_string(),
    }
}

/// Split `schema.table` into its parts, defaulting to `main`.
fn split_qualified(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => ("main", name),
    }
}

impl SchemaOps for DuckDbConnection {
    fn execute(&self, sql: &str) -> ActionResult<usize> {
        self.conn.execute(sql, []).map_err(|e| sql_error(sql, e))
    }

    fn execute_batch(&self, sql: &str) -> ActionResult<()> {
        self.conn.execute_batch(sql).map_err(|e| sql_error(sql, e))
    }

    fn query_exists(&self, sql: &str) -> ActionResult<bool> {
        let wrapped = format!("SELECT EXISTS ({})", sql.trim().trim_end_matches(';'));
        self.conn
            .query_row(&wrapped, [], |row| row.get(0))
            .map_err(|e| sql_error(sql, e))
    }

    fn table_exists(&self, table: &str) -> ActionResult<bool> {
        let (schema, table) = split_qualified(table);
        let count = self.count(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
            &[schema, table],
        )?;
        Ok(count > 0)
    }

    fn column_exists(&self, table: &str, column: &str) -> ActionResult<bool> {
        let (schema, table) = split_qualified(table);
        let count = self.count(
            "SELECT COUNT(*) FROM information_schema.columns \
             WHERE table_schema = ? AND table_name = ? AND column_name = ?",
            &[schema, table, column],
        )?;
        Ok(count > 0)
    }

    fn index_exists(&self, index: &str) -> ActionResult<bool> {
        let (schema, index) = split_qualified(index);
        let count = self.count(
            "SELECT COUNT(*) FROM duckdb_indexes() WHERE schema_name = ? AND index_name = ?",
            &[schema, index],
        )?;
        Ok(count > 0)
    }
}

impl std::fmt::Debug for DuckDbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbConnection").finish_non_exhaustive()
    }
}

/// Quote an identifier for interpolation into DDL.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Run a parameterized statement, used by the version tracker.
pub(crate) fn execute_params(
    conn: &DuckDbConnection,
    sql: &str,
    args: &[&dyn duckdb::ToSql],
) -> DbResult<usize> {
    conn.conn()
        .execute(sql, args)
        .map_err(|e| DbError::ExecutionError(format!("{e}: {sql}")))
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
