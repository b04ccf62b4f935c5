//! The capability a migration step runs with.
//!
//! An [`Action`] is a forward or reverse procedure. It only sees the
//! [`SchemaOps`] surface of the connection, so the runner never needs to know
//! what an action does internally and actions never see transactions.

use crate::error::ActionResult;
use crate::revision::RevisionId;

/// Structural and data operations available to an action.
///
/// Implemented by the database layer; every call happens inside the step's
/// transaction.
pub trait SchemaOps {
    /// Execute a single statement, returning the affected row count
    fn execute(&self, sql: &str) -> ActionResult<usize>;

    /// Execute one or more statements separated by `;`
    fn execute_batch(&self, sql: &str) -> ActionResult<()>;

    /// Return true if the query yields at least one row
    fn query_exists(&self, sql: &str) -> ActionResult<bool>;

    /// Check if a table or view exists (`schema.table` or bare `table`)
    fn table_exists(&self, table: &str) -> ActionResult<bool>;

    /// Check if a column exists on a table
    fn column_exists(&self, table: &str, column: &str) -> ActionResult<bool>;

    /// Check if an index exists
    fn index_exists(&self, index: &str) -> ActionResult<bool>;
}

/// Everything an action receives for one step.
pub struct StepContext<'a> {
    /// Connection surface scoped to the step transaction
    pub conn: &'a dyn SchemaOps,

    /// Revision being applied or reverted
    pub revision: &'a RevisionId,

    /// Execution environment name (e.g. `development`, `production`)
    pub environment: &'a str,
}

impl StepContext<'_> {
    /// True when running in the named environment.
    pub fn is_environment(&self, name: &str) -> bool {
        self.environment.eq_ignore_ascii_case(name)
    }
}

/// A forward or reverse migration procedure.
pub trait Action: Send + Sync {
    /// Run the procedure against the step's connection.
    fn run(&self, ctx: &StepContext<'_>) -> ActionResult<()>;
}

impl<F> Action for F
where
    F: Fn(&StepContext<'_>) -> ActionResult<()> + Send + Sync,
{
    fn run(&self, ctx: &StepContext<'_>) -> ActionResult<()> {
        self(ctx)
    }
}
