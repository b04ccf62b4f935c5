//! History command implementation

use anyhow::{Context, Result};
use tm_db::{HistoryEntry, MigrationRunner};

use crate::cli::{GlobalArgs, HistoryArgs, HistoryOutput};
use crate::commands::common::Project;

/// Execute the history command
pub(crate) async fn execute(args: &HistoryArgs, global: &GlobalArgs) -> Result<()> {
    let project = Project::load(global)?;
    let store = project.load_store()?;
    let db = project.open_database()?;
    let tracker = project.tracker();
    let entries = MigrationRunner::new(&db, &tracker).history(&store)?;

    match args.output {
        HistoryOutput::Table => print_table(&entries),
        HistoryOutput::Json => print_json(&entries)?,
    }

    let drifted = entries.iter().filter(|e| e.checksum_drift).count();
    if drifted > 0 {
        eprintln!(
            "Warning: {drifted} applied migration(s) changed on disk since they were applied"
        );
    }
    Ok(())
}

fn print_table(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No migrations found.");
        return;
    }

    let width = entries
        .iter()
        .map(|e| e.revision.len())
        .max()
        .unwrap_or(0)
        .max("REVISION".len());

    println!("   {:<width$}  {:<width$}  DESCRIPTION", "REVISION", "PARENT");
    for entry in entries {
        let mark = if entry.applied { "*" } else { " " };
        let parent = entry.down_revision.as_ref().map_or("-", |r| r.as_str());

        let mut tags = Vec::new();
        if entry.current {
            tags.push("current");
        }
        if entry.head {
            tags.push("head");
        }
        if !entry.reversible {
            tags.push("irreversible");
        }
        if entry.checksum_drift {
            tags.push("changed");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" ({})", tags.join(", "))
        };

        println!(
            " {} {:<width$}  {:<width$}  {}{}",
            mark,
            entry.revision.as_str(),
            parent,
            entry.description,
            tags
        );
    }
    println!("\n* = applied");
}

fn print_json(entries: &[HistoryEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(entries).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}
