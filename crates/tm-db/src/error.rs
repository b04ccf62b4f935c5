//! Error types for tm-db

use thiserror::Error;
use tm_core::{ActionError, CoreError, Direction, RevisionId};

/// Database and runner errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Transaction management error (D003)
    #[error("[D003] Transaction failed: {0}")]
    TransactionError(String),

    /// The version table is unreadable or holds an invalid value (D004)
    #[error("[D004] Version table error: {0}")]
    VersionTableError(String),

    /// A step failed and was rolled back; earlier steps stay committed (D005)
    #[error(
        "[D005] {direction} of revision '{revision}' failed; database left at {}",
        display_marker(.marker)
    )]
    StepExecutionFailure {
        revision: RevisionId,
        direction: Direction,
        marker: Option<RevisionId>,
        #[source]
        source: Box<DbError>,
    },

    /// Downgrade would cross a revision with no reverse action (D006)
    #[error("[D006] Revision '{revision}' is irreversible; no steps were run")]
    Irreversible { revision: RevisionId },

    /// Interrupted between steps (D007)
    #[error("[D007] Cancelled; database left at {}", display_marker(.marker))]
    Cancelled { marker: Option<RevisionId> },

    /// An action reported a failure (D008)
    #[error("[D008] {0}")]
    Action(#[from] ActionError),

    /// Loading or resolving migrations failed
    #[error(transparent)]
    Resolution(#[from] CoreError),

    /// DuckDB driver error with preserved source chain (D009)
    #[error("[D009] DuckDB error")]
    DuckDb(#[source] duckdb::Error),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::DuckDb(err)
    }
}

/// Render an optional marker, with `base` for "nothing applied".
pub fn display_marker(marker: &Option<RevisionId>) -> &str {
    marker.as_ref().map_or("base", |m| m.as_str())
}

impl DbError {
    /// True when the failure happened after a step began, so the database may
    /// sit at an intermediate revision.
    pub fn is_partial_run(&self) -> bool {
        matches!(
            self,
            DbError::StepExecutionFailure { .. } | DbError::Cancelled { .. }
        )
    }
}
