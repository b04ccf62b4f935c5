//! Revision command implementation

use anyhow::{Context, Result};
use std::fs;
use tm_core::naming::definition_file_name;
use tm_core::{ChainResolver, MigrationStore, RevisionId};

use crate::cli::{GlobalArgs, RevisionArgs};
use crate::commands::common::Project;

/// Execute the revision command
pub(crate) async fn execute(args: &RevisionArgs, global: &GlobalArgs) -> Result<()> {
    let project = Project::load(global)?;
    let dir = project.migrations_dir();

    let store = if dir.is_dir() {
        project.load_store()?
    } else {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        MigrationStore::new()
    };

    let resolver = ChainResolver::build(&store)?;
    let parent = resolver.head()?.cloned();

    let mut revision = RevisionId::generate();
    while store.get(&revision).is_some() {
        revision = RevisionId::generate();
    }

    let path = dir.join(definition_file_name(&revision, &args.message));
    let content = render_definition(&revision, parent.as_ref(), &args.message)?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {}", path.display());
    if let Some(parent) = parent {
        println!("  revises {}", parent);
    }
    Ok(())
}

/// Render a new definition file.
///
/// Scalars are written as JSON strings, which YAML reads back verbatim even
/// for all-digit revisions.
fn render_definition(
    revision: &RevisionId,
    parent: Option<&RevisionId>,
    message: &str,
) -> Result<String> {
    let quote = |s: &str| serde_json::to_string(s).context("Failed to quote value");
    let down_revision = match parent {
        Some(p) => quote(p.as_str())?,
        None => "null".to_string(),
    };

    Ok(format!(
        "# Created {created}\n\
         revision: {revision}\n\
         down_revision: {down_revision}\n\
         description: {description}\n\
         \n\
         # Steps run in order inside one transaction. Each step sets `sql` or\n\
         # `batch: {{ sql, size }}`, with optional `when` / `unless` guards and\n\
         # `environments` / `skip_environments` filters.\n\
         upgrade: []\n\
         \n\
         # Remove `downgrade` entirely to mark this migration irreversible.\n\
         downgrade: []\n",
        created = chrono::Utc::now().to_rfc3339(),
        revision = quote(revision.as_str())?,
        down_revision = down_revision,
        description = quote(message)?,
    ))
}
