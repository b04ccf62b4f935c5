//! tm-core - Core library for Tidemark
//!
//! This crate provides revision identifiers, the migration definition format,
//! directory discovery of migration records, and the chain resolver that turns
//! them into an ordered upgrade or downgrade plan.

pub mod action;
pub mod config;
pub mod error;
pub mod naming;
pub mod record;
pub mod resolver;
pub mod revision;
pub mod script;
pub mod store;
pub mod target;

pub use action::{Action, SchemaOps, StepContext};
pub use config::Config;
pub use error::{ActionError, ActionResult, CoreError, CoreResult};
pub use record::{MigrationRecord, RecordOrigin};
pub use resolver::{ChainResolver, Direction, MigrationPlan, PlannedStep};
pub use revision::RevisionId;
pub use script::{Condition, Script, Step, StepKind};
pub use store::MigrationStore;
pub use target::Target;
