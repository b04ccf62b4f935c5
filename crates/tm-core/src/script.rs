//! Scripted actions declared in definition files.
//!
//! A script is an ordered list of steps. Each step runs plain SQL or a batched
//! statement, optionally guarded by existence checks and environment filters:
//!
//! ```yaml
//! upgrade:
//!   - sql: ALTER TABLE users ADD COLUMN nickname VARCHAR
//!     unless:
//!       column_exists: { table: users, column: nickname }
//!   - batch:
//!       sql: UPDATE users SET nickname = name WHERE id IN (SELECT id FROM users WHERE nickname IS NULL LIMIT {batch_size})
//!       size: 500
//!   - sql: CREATE INDEX idx_users_nickname ON users (nickname)
//!     skip_environments: [development]
//! ```

use crate::action::{Action, StepContext};
use crate::error::{ActionError, ActionResult};
use serde::Deserialize;

/// Placeholder substituted with the batch size in batched statements.
pub const BATCH_SIZE_PLACEHOLDER: &str = "{batch_size}";

/// Default number of rows per batch iteration.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Upper bound on batch iterations before a batch step is abandoned.
pub const MAX_BATCH_ITERATIONS: usize = 100_000;

/// An existence or query check used by step guards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCondition")]
pub enum Condition {
    /// Table or view exists
    TableExists(String),
    /// Column exists on a table
    ColumnExists { table: String, column: String },
    /// Index exists
    IndexExists(String),
    /// Query returns at least one row
    Query(String),
}

/// Column reference in a `column_exists` condition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

/// On-disk shape of a condition: exactly one key must be set.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCondition {
    #[serde(default)]
    table_exists: Option<String>,
    #[serde(default)]
    column_exists: Option<ColumnRef>,
    #[serde(default)]
    index_exists: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

impl TryFrom<RawCondition> for Condition {
    type Error = String;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        let mut found = Vec::new();
        if let Some(t) = raw.table_exists {
            found.push(Condition::TableExists(t));
        }
        if let Some(c) = raw.column_exists {
            found.push(Condition::ColumnExists {
                table: c.table,
                column: c.column,
            });
        }
        if let Some(i) = raw.index_exists {
            found.push(Condition::IndexExists(i));
        }
        if let Some(q) = raw.query {
            found.push(Condition::Query(q));
        }
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err("condition must set one of table_exists, column_exists, index_exists, query".into()),
            _ => Err("condition must set exactly one check".into()),
        }
    }
}

impl Condition {
    /// Evaluate the condition against the step's connection.
    pub fn holds(&self, ctx: &StepContext<'_>) -> ActionResult<bool> {
        match self {
            Condition::TableExists(t) => ctx.conn.table_exists(t),
            Condition::ColumnExists { table, column } => ctx.conn.column_exists(table, column),
            Condition::IndexExists(i) => ctx.conn.index_exists(i),
            Condition::Query(q) => ctx.conn.query_exists(q),
        }
    }
}

/// What a step executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// One or more statements executed once
    Sql(String),
    /// A statement re-executed until it affects zero rows
    Batch { sql: String, size: usize },
}

/// Batched statement as written in a definition file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBatch {
    sql: String,
    #[serde(default = "default_batch_size")]
    size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// One entry of an `upgrade` or `downgrade` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawStep")]
pub struct Step {
    pub kind: StepKind,
    /// Run only when this condition holds
    pub when: Option<Condition>,
    /// Skip when this condition holds
    pub unless: Option<Condition>,
    /// Run only in these environments (empty = all)
    pub environments: Vec<String>,
    /// Never run in these environments
    pub skip_environments: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    #[serde(default)]
    sql: Option<String>,
    #[serde(default)]
    batch: Option<RawBatch>,
    #[serde(default)]
    when: Option<Condition>,
    #[serde(default)]
    unless: Option<Condition>,
    #[serde(default)]
    environments: Vec<String>,
    #[serde(default)]
    skip_environments: Vec<String>,
}

impl TryFrom<RawStep> for Step {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let kind = match (raw.sql, raw.batch) {
            (Some(sql), None) => {
                if sql.trim().is_empty() {
                    return Err("step 'sql' must not be empty".into());
                }
                StepKind::Sql(sql)
            }
            (None, Some(batch)) => {
                if !batch.sql.contains(BATCH_SIZE_PLACEHOLDER) {
                    return Err(format!(
                        "batch sql must contain the {BATCH_SIZE_PLACEHOLDER} placeholder"
                    ));
                }
                if batch.size == 0 {
                    return Err("batch size must be greater than zero".into());
                }
                StepKind::Batch {
                    sql: batch.sql,
                    size: batch.size,
                }
            }
            (Some(_), Some(_)) => return Err("step must set only one of 'sql' or 'batch'".into()),
            (None, None) => return Err("step must set 'sql' or 'batch'".into()),
        };
        Ok(Step {
            kind,
            when: raw.when,
            unless: raw.unless,
            environments: raw.environments,
            skip_environments: raw.skip_environments,
        })
    }
}

impl Step {
    /// Create an unguarded SQL step.
    pub fn sql(sql: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Sql(sql.into()),
            when: None,
            unless: None,
            environments: Vec::new(),
            skip_environments: Vec::new(),
        }
    }

    /// Decide whether this step should run in `ctx`.
    fn should_run(&self, ctx: &StepContext<'_>) -> ActionResult<bool> {
        if !self.environments.is_empty()
            && !self.environments.iter().any(|e| ctx.is_environment(e))
        {
            return Ok(false);
        }
        if self.skip_environments.iter().any(|e| ctx.is_environment(e)) {
            return Ok(false);
        }
        if let Some(cond) = &self.when {
            if !cond.holds(ctx)? {
                return Ok(false);
            }
        }
        if let Some(cond) = &self.unless {
            if cond.holds(ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn execute(&self, ctx: &StepContext<'_>) -> ActionResult<()> {
        match &self.kind {
            StepKind::Sql(sql) => ctx.conn.execute_batch(sql),
            StepKind::Batch { sql, size } => {
                let stmt = sql.replace(BATCH_SIZE_PLACEHOLDER, &size.to_string());
                let mut total = 0usize;
                for iteration in 0..MAX_BATCH_ITERATIONS {
                    let affected = ctx.conn.execute(&stmt)?;
                    if affected == 0 {
                        log::debug!(
                            "{}: batch finished after {} iteration(s), {} row(s)",
                            ctx.revision,
                            iteration,
                            total
                        );
                        return Ok(());
                    }
                    total += affected;
                }
                Err(ActionError::BatchLimit {
                    sql: stmt,
                    iterations: MAX_BATCH_ITERATIONS,
                })
            }
        }
    }
}

/// An ordered list of steps, usable as an [`Action`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    /// Build a script from unguarded SQL statements.
    pub fn from_sql<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: statements.into_iter().map(Step::sql).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Action for Script {
    fn run(&self, ctx: &StepContext<'_>) -> ActionResult<()> {
        for (i, step) in self.steps.iter().enumerate() {
            if !step.should_run(ctx)? {
                log::info!("{}: skipping step {} (guard not met)", ctx.revision, i + 1);
                continue;
            }
            step.execute(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "script_test.rs"]
mod tests;
