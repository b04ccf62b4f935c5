//! Shared driver for upgrade and downgrade

use anyhow::Result;
use std::time::Instant;
use tm_core::{ChainResolver, Direction, MigrationPlan, Target};
use tm_db::error::display_marker;
use tm_db::{MigrationRunner, RunOutcome, RunReport};

use crate::cli::GlobalArgs;
use crate::commands::common::{self, ExitCode, Project, EXIT_NO_OP};

enum Completed {
    DryRun,
    Ran(RunReport),
}

/// Resolve a plan in `direction` and run it (or print it for `--dry-run`).
pub(crate) async fn execute(
    direction: Direction,
    target: &Target,
    dry_run: bool,
    global: &GlobalArgs,
) -> Result<()> {
    let start_time = Instant::now();
    let project = Project::load(global)?;
    let cancel = common::cancel_on_ctrl_c();
    let target = target.clone();

    let completed = common::blocking(move || -> Result<Completed> {
        let store = project.load_store()?;
        let db = project.open_database()?;
        let tracker = project.tracker();
        let runner = MigrationRunner::new(&db, &tracker)
            .with_environment(project.environment.clone())
            .with_cancel_flag(cancel);

        let resolver = ChainResolver::build(&store)?;
        let plan = match direction {
            Direction::Upgrade => runner.plan_upgrade(&resolver, &target),
            Direction::Downgrade => runner.plan_downgrade(&resolver, &target),
        }
        .map_err(common::run_error)?;

        if dry_run {
            print_plan(&plan);
            return Ok(Completed::DryRun);
        }
        if !plan.is_empty() {
            println!(
                "Running {} migration(s) ({})...\n",
                plan.steps.len(),
                direction
            );
        }
        let report = runner.execute(&plan).map_err(common::run_error)?;
        Ok(Completed::Ran(report))
    })
    .await?;

    let report = match completed {
        Completed::DryRun => return Ok(()),
        Completed::Ran(report) => report,
    };

    if report.outcome == RunOutcome::AlreadyAtTarget {
        println!(
            "Already at {}; nothing to {}",
            display_marker(&report.to),
            direction
        );
        return Err(ExitCode(EXIT_NO_OP).into());
    }

    for step in &report.steps {
        let symbol = match direction {
            Direction::Upgrade => "↑",
            Direction::Downgrade => "↓",
        };
        if step.description.is_empty() {
            println!(
                "  {} {} [{}ms]",
                symbol,
                step.revision,
                step.duration.as_millis()
            );
        } else {
            println!(
                "  {} {} - {} [{}ms]",
                symbol,
                step.revision,
                step.description,
                step.duration.as_millis()
            );
        }
    }
    println!();
    println!(
        "Now at {} (was {})",
        display_marker(&report.to),
        display_marker(&report.from)
    );
    println!("Total time: {}ms", start_time.elapsed().as_millis());
    Ok(())
}

fn print_plan(plan: &MigrationPlan<'_>) {
    if plan.is_empty() {
        println!(
            "Already at {}; nothing to {}",
            display_marker(&plan.to),
            plan.direction
        );
        return;
    }
    println!(
        "Plan: {} from {} to {} ({} step(s))",
        plan.direction,
        display_marker(&plan.from),
        display_marker(&plan.to),
        plan.steps.len()
    );
    for (i, step) in plan.steps.iter().enumerate() {
        println!(
            "  {}. {} -> marker {}",
            i + 1,
            step.record.revision,
            display_marker(&step.marker_after)
        );
    }
}
