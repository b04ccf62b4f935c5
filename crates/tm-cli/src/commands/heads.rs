//! Heads command implementation

use anyhow::Result;
use tm_core::ChainResolver;

use crate::cli::{GlobalArgs, HeadsArgs};
use crate::commands::common::Project;

/// Execute the heads command
pub(crate) async fn execute(_args: &HeadsArgs, global: &GlobalArgs) -> Result<()> {
    let project = Project::load(global)?;
    let store = project.load_store()?;
    let resolver = ChainResolver::build(&store)?;
    let heads = resolver.heads();

    if heads.is_empty() {
        println!("No migrations found in {}", project.migrations_dir().display());
        return Ok(());
    }

    for record in &heads {
        if record.description.is_empty() {
            println!("{}", record.revision);
        } else {
            println!("{}  {}", record.revision, record.description);
        }
    }
    if heads.len() > 1 {
        eprintln!(
            "\n{} heads: re-point one branch's down_revision at the other branch's head",
            heads.len()
        );
    }
    Ok(())
}
