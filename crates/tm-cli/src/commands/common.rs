//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tm_core::{Config, MigrationStore};
use tm_db::{DbError, DuckDbConnection, TableVersionTracker};

use crate::cli::GlobalArgs;

/// Configuration, resolution, or preflight failure
pub(crate) const EXIT_FAILURE: u8 = 1;

/// A step failed or the run was cancelled part way through
pub(crate) const EXIT_PARTIAL: u8 = 2;

/// Nothing to do: the marker already matches the target
pub(crate) const EXIT_NO_OP: u8 = 3;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) u8);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main never prints it.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Everything a command needs to reach the target database.
#[derive(Debug)]
pub(crate) struct Project {
    pub(crate) root: PathBuf,
    pub(crate) config: Config,
    pub(crate) database_path: String,
    pub(crate) environment: String,
}

impl Project {
    /// Load tidemark.yml and apply `--target` / `--env` overrides.
    pub(crate) fn load(global: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&global.project_dir);
        let config = Config::load_from_dir(&root)
            .with_context(|| format!("Failed to load project at {}", root.display()))?;
        let target = global.target.as_deref();
        let database_path = config.database_path(&root, target)?;
        let environment = match &global.environment {
            Some(env) => env.clone(),
            None => config.environment_for(target)?,
        };

        if global.verbose {
            eprintln!(
                "[verbose] Project '{}': database {}, environment {}",
                config.name, database_path, environment
            );
        }

        Ok(Self {
            root,
            config,
            database_path,
            environment,
        })
    }

    /// Absolute path of the migrations directory.
    pub(crate) fn migrations_dir(&self) -> PathBuf {
        self.config.migrations_path_absolute(&self.root)
    }

    /// Discover every migration definition.
    pub(crate) fn load_store(&self) -> Result<MigrationStore> {
        MigrationStore::load(&self.migrations_dir()).map_err(anyhow::Error::from)
    }

    /// Open the target database.
    pub(crate) fn open_database(&self) -> Result<DuckDbConnection> {
        DuckDbConnection::open(&self.database_path)
            .with_context(|| format!("Failed to open database {}", self.database_path))
    }

    pub(crate) fn tracker(&self) -> TableVersionTracker {
        TableVersionTracker::from_config(&self.config)
    }
}

/// Flag set on Ctrl-C; the runner stops at the next step boundary.
pub(crate) fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handle = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received; stopping after the current step...");
            handle.store(true, Ordering::SeqCst);
        }
    });
    flag
}

/// Map a runner error to the exit status contract.
///
/// Partial runs print their error here and exit 2; everything else propagates
/// and exits 1.
pub(crate) fn run_error(err: DbError) -> anyhow::Error {
    if err.is_partial_run() {
        eprintln!("Error: {:#}", anyhow::Error::from(err));
        ExitCode(EXIT_PARTIAL).into()
    } else {
        err.into()
    }
}

/// Join a blocking database task, surfacing panics as errors.
pub(crate) async fn blocking<F, T>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .context("Database task panicked")?
}
