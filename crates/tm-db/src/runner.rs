//! Migration Runner: executes a resolved plan one transaction per step.
//!
//! Each step runs the record's action and the marker write inside a single
//! transaction, so the marker always names the last fully applied revision.
//! A failing step is rolled back alone; earlier steps stay committed.
//! Cancellation is cooperative and only observed between steps.

use crate::connection::DuckDbConnection;
use crate::error::{DbError, DbResult};
use crate::tracker::{LogEntry, VersionTracker};
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tm_core::{
    Action, ActionError, ActionResult, ChainResolver, Direction, MigrationPlan, MigrationStore,
    RevisionId, StepContext, Target,
};

/// Environment used when none is configured
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// At least one step was applied
    Applied,
    /// The marker already matched the target; nothing ran
    AlreadyAtTarget,
}

/// A committed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub revision: RevisionId,
    pub description: String,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Result of an upgrade or downgrade.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub direction: Direction,
    pub from: Option<RevisionId>,
    pub to: Option<RevisionId>,
    pub steps: Vec<StepReport>,
    pub outcome: RunOutcome,
}

/// Result of a stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StampReport {
    pub from: Option<RevisionId>,
    pub to: Option<RevisionId>,
}

/// One record in history order with its applied state.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub revision: RevisionId,
    pub down_revision: Option<RevisionId>,
    pub depends_on: Vec<RevisionId>,
    pub description: String,
    pub applied: bool,
    pub current: bool,
    pub head: bool,
    pub reversible: bool,
    /// The definition changed since it was last applied
    pub checksum_drift: bool,
}

/// Drives plans against one connection and one version tracker.
pub struct MigrationRunner<'a> {
    conn: &'a DuckDbConnection,
    tracker: &'a dyn VersionTracker,
    environment: String,
    cancel: Arc<AtomicBool>,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(conn: &'a DuckDbConnection, tracker: &'a dyn VersionTracker) -> Self {
        Self {
            conn,
            tracker,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Environment passed to every action.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Flag checked before each step; set it to stop after the in-flight step.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// The persisted marker.
    pub fn current(&self) -> DbResult<Option<RevisionId>> {
        self.tracker.read(self.conn)
    }

    /// Plan an upgrade from the persisted marker.
    pub fn plan_upgrade<'s>(
        &self,
        resolver: &ChainResolver<'s>,
        target: &Target,
    ) -> DbResult<MigrationPlan<'s>> {
        let current = self.current()?;
        Ok(resolver.plan_upgrade(current.as_ref(), target)?)
    }

    /// Plan a downgrade from the persisted marker, refusing to cross an
    /// irreversible record.
    pub fn plan_downgrade<'s>(
        &self,
        resolver: &ChainResolver<'s>,
        target: &Target,
    ) -> DbResult<MigrationPlan<'s>> {
        let current = self.current()?;
        let plan = resolver.plan_downgrade(current.as_ref(), target)?;
        if let Some(record) = plan.records().find(|r| !r.is_reversible()) {
            return Err(DbError::Irreversible {
                revision: record.revision.clone(),
            });
        }
        Ok(plan)
    }

    /// Apply forward actions up to `target`.
    pub fn upgrade(&self, store: &MigrationStore, target: &Target) -> DbResult<RunReport> {
        let resolver = ChainResolver::build(store)?;
        let plan = self.plan_upgrade(&resolver, target)?;
        self.execute(&plan)
    }

    /// Apply reverse actions down to `target`.
    pub fn downgrade(&self, store: &MigrationStore, target: &Target) -> DbResult<RunReport> {
        let resolver = ChainResolver::build(store)?;
        let plan = self.plan_downgrade(&resolver, target)?;
        self.execute(&plan)
    }

    /// Run every step of `plan`, one transaction each.
    pub fn execute(&self, plan: &MigrationPlan<'_>) -> DbResult<RunReport> {
        let mut report = RunReport {
            direction: plan.direction,
            from: plan.from.clone(),
            to: plan.from.clone(),
            steps: Vec::with_capacity(plan.steps.len()),
            outcome: RunOutcome::AlreadyAtTarget,
        };
        if plan.is_empty() {
            log::info!(
                "Already at {}; nothing to {}",
                crate::error::display_marker(&plan.to),
                plan.direction
            );
            return Ok(report);
        }

        self.tracker.ensure(self.conn)?;
        let mut marker = plan.from.clone();

        for step in &plan.steps {
            if self.cancel.load(Ordering::SeqCst) {
                log::warn!("Cancelled before {}", step.record.revision);
                return Err(DbError::Cancelled { marker });
            }

            let record = step.record;
            let action: &dyn Action = match plan.direction {
                Direction::Upgrade => &*record.upgrade,
                Direction::Downgrade => match record.downgrade.as_deref() {
                    Some(action) => action,
                    None => {
                        return Err(DbError::Irreversible {
                            revision: record.revision.clone(),
                        })
                    }
                },
            };

            log::info!(
                "Running {} {}{}",
                plan.direction,
                record.revision,
                if record.description.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", record.description)
                }
            );
            let started = Instant::now();

            self.conn
                .transaction(|conn| {
                    let ctx = StepContext {
                        conn,
                        revision: &record.revision,
                        environment: &self.environment,
                    };
                    run_action(action, &ctx)?;
                    self.tracker.write(conn, step.marker_after.as_ref())?;
                    self.tracker.record(
                        conn,
                        &LogEntry {
                            revision: record.revision.clone(),
                            direction: plan.direction,
                            checksum: record.checksum().map(String::from),
                            applied_at: chrono::Utc::now().to_rfc3339(),
                        },
                    )
                })
                .map_err(|source| {
                    log::error!("{} of {} failed: {source}", plan.direction, record.revision);
                    DbError::StepExecutionFailure {
                        revision: record.revision.clone(),
                        direction: plan.direction,
                        marker: marker.clone(),
                        source: Box::new(source),
                    }
                })?;

            let duration = started.elapsed();
            log::debug!("{} committed in {}ms", record.revision, duration.as_millis());
            marker = step.marker_after.clone();
            report.steps.push(StepReport {
                revision: record.revision.clone(),
                description: record.description.clone(),
                duration,
            });
        }

        report.to = marker;
        report.outcome = RunOutcome::Applied;
        Ok(report)
    }

    /// Set the marker without running any action.
    ///
    /// Nothing checks that the schema actually matches the new marker.
    pub fn stamp(&self, store: &MigrationStore, target: &Target) -> DbResult<StampReport> {
        let resolver = ChainResolver::build(store)?;
        let from = self.current()?;
        let to = resolver.resolve_marker(from.as_ref(), target)?;

        log::warn!(
            "Stamping {} without running migrations; the schema is not verified",
            crate::error::display_marker(&to)
        );
        self.tracker.ensure(self.conn)?;
        self.conn
            .transaction(|conn| self.tracker.write(conn, to.as_ref()))?;
        Ok(StampReport { from, to })
    }

    /// Every record in resolved order, annotated with the persisted state.
    pub fn history(&self, store: &MigrationStore) -> DbResult<Vec<HistoryEntry>> {
        let resolver = ChainResolver::build(store)?;
        let current = self.current()?;
        let applied: HashSet<&RevisionId> = resolver
            .applied(current.as_ref())?
            .into_iter()
            .map(|r| &r.revision)
            .collect();
        let heads: HashSet<&RevisionId> =
            resolver.heads().into_iter().map(|r| &r.revision).collect();
        let log = self.tracker.log(self.conn)?;

        Ok(resolver
            .history()
            .into_iter()
            .map(|record| {
                let is_applied = applied.contains(&record.revision);
                let last_checksum = log
                    .iter()
                    .rev()
                    .find(|e| e.revision == record.revision && e.direction == Direction::Upgrade)
                    .and_then(|e| e.checksum.as_deref());
                let checksum_drift = is_applied
                    && matches!(
                        (last_checksum, record.checksum()),
                        (Some(then), Some(now)) if then != now
                    );
                if checksum_drift {
                    log::warn!(
                        "Revision {} changed since it was applied",
                        record.revision
                    );
                }
                HistoryEntry {
                    revision: record.revision.clone(),
                    down_revision: record.down_revision.clone(),
                    depends_on: record.depends_on.clone(),
                    description: record.description.clone(),
                    applied: is_applied,
                    current: current.as_ref() == Some(&record.revision),
                    head: heads.contains(&record.revision),
                    reversible: record.is_reversible(),
                    checksum_drift,
                }
            })
            .collect())
    }
}

/// Run `action`, turning a panic into a step failure so the transaction
/// rolls back and the run reports the revision like any other error.
fn run_action(action: &dyn Action, ctx: &StepContext<'_>) -> ActionResult<()> {
    match catch_unwind(AssertUnwindSafe(|| action.run(ctx))) {
        Ok(result) => result,
        Err(payload) => Err(ActionError::Failed(format!(
            "action panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
