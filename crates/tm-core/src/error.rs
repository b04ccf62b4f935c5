//! Error types for tm-core

use thiserror::Error;

/// Core error type for Tidemark
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Invalid configuration value
    #[error("[E002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E003: Migrations directory not found
    #[error("[E003] Migrations directory not found: {path}")]
    MigrationsDirNotFound { path: String },

    /// E004: Two definitions declare the same revision
    #[error("[E004] Duplicate revision '{revision}' in {path1} and {path2}")]
    DuplicateIdentifier {
        revision: String,
        path1: String,
        path2: String,
    },

    /// E005: A definition is missing required fields or is otherwise invalid
    #[error("[E005] Malformed migration {path}: {reason}")]
    MalformedRecord { path: String, reason: String },

    /// E006: A predecessor or dependency points at a revision that does not exist
    #[error("[E006] Broken chain: revision '{revision}' references unknown revision '{missing}'")]
    BrokenChain { revision: String, missing: String },

    /// E007: The chain branches: more than one record has no successor, or
    /// several records revise the same predecessor
    #[error("[E007] Multiple heads: {}. Each revision may have at most one successor", heads.join(", "))]
    MultipleHeads { heads: Vec<String> },

    /// E015: More than one record has no predecessor
    #[error("[E015] Multiple roots: {}. Independent chains cannot be ordered against each other", roots.join(", "))]
    MultipleRoots { roots: Vec<String> },

    /// E008: A dependency edge closes a loop
    #[error("[E008] Dependency cycle detected: {cycle}")]
    CycleDetected { cycle: String },

    /// E009: A revision id (or prefix) matched nothing in the store
    #[error("[E009] Unknown revision: {revision}")]
    UnknownRevision { revision: String },

    /// E010: A revision prefix matched more than one id
    #[error("[E010] Ambiguous revision prefix '{prefix}' matches: {}", candidates.join(", "))]
    AmbiguousRevision {
        prefix: String,
        candidates: Vec<String>,
    },

    /// E011: Target is not reachable in the requested direction
    #[error("[E011] Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// E013: IO error with file path context
    #[error("[E013] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E014: YAML parse error
    #[error("[E014] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

/// Failure raised by a migration action while it runs.
///
/// Kept separate from [`CoreError`] because it originates inside a step and is
/// wrapped by the runner together with the failing revision.
#[derive(Error, Debug)]
pub enum ActionError {
    /// A statement was rejected by the database
    #[error("SQL failed: {message}\n  statement: {sql}")]
    Sql { sql: String, message: String },

    /// A batched statement never reached zero affected rows
    #[error("Batch did not converge after {iterations} iterations: {sql}")]
    BatchLimit { sql: String, iterations: usize },

    /// A code-defined action reported its own failure
    #[error("{0}")]
    Failed(String),
}

/// Result type alias for ActionError
pub type ActionResult<T> = Result<T, ActionError>;
