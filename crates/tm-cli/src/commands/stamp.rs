//! Stamp command implementation

use anyhow::Result;
use tm_db::error::display_marker;
use tm_db::MigrationRunner;

use crate::cli::{GlobalArgs, StampArgs};
use crate::commands::common::{self, Project};

/// Execute the stamp command
pub(crate) async fn execute(args: &StampArgs, global: &GlobalArgs) -> Result<()> {
    let project = Project::load(global)?;
    let store = project.load_store()?;
    let db = project.open_database()?;
    let tracker = project.tracker();
    let runner = MigrationRunner::new(&db, &tracker);

    eprintln!(
        "Warning: stamp runs no migrations and does not verify that the schema matches '{}'",
        args.revision
    );
    let report = runner.stamp(&store, &args.revision).map_err(common::run_error)?;
    println!(
        "Stamped {} (was {})",
        display_marker(&report.to),
        display_marker(&report.from)
    );
    Ok(())
}
