//! tm-db - Database layer for Tidemark
//!
//! This crate provides the DuckDB connection that migration actions run
//! against, the version tracker that persists the applied-revision marker,
//! and the runner that executes resolved plans step by step.

pub mod connection;
pub mod error;
pub mod runner;
pub mod tracker;

pub use connection::{DuckDbConnection, MEMORY_PATH};
pub use error::{DbError, DbResult};
pub use runner::{HistoryEntry, MigrationRunner, RunOutcome, RunReport, StampReport, StepReport};
pub use tracker::{LogEntry, TableVersionTracker, VersionTracker};
