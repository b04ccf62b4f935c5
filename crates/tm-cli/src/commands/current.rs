//! Current command implementation

use anyhow::Result;
use tm_core::ChainResolver;
use tm_db::error::display_marker;
use tm_db::MigrationRunner;

use crate::cli::{CurrentArgs, GlobalArgs};
use crate::commands::common::Project;

/// Execute the current command
pub(crate) async fn execute(_args: &CurrentArgs, global: &GlobalArgs) -> Result<()> {
    let project = Project::load(global)?;
    let db = project.open_database()?;
    let tracker = project.tracker();
    let current = MigrationRunner::new(&db, &tracker).current()?;

    // Head annotation is best effort; the marker is reported regardless.
    let is_head = match project.load_store() {
        Ok(store) => ChainResolver::build(&store)
            .and_then(|resolver| resolver.head().map(|h| h.cloned()))
            .map(|head| current.is_some() && head == current)
            .unwrap_or(false),
        Err(e) => {
            log::debug!("Skipping head check: {e}");
            false
        }
    };

    if is_head {
        println!("{} (head)", display_marker(&current));
    } else {
        println!("{}", display_marker(&current));
    }
    Ok(())
}
