//! Upgrade command implementation

use anyhow::Result;
use tm_core::Direction;

use crate::cli::{GlobalArgs, UpgradeArgs};
use crate::commands::migrate;

/// Execute the upgrade command
pub(crate) async fn execute(args: &UpgradeArgs, global: &GlobalArgs) -> Result<()> {
    migrate::execute(Direction::Upgrade, &args.revision, args.dry_run, global).await
}
