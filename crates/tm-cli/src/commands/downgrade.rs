//! Downgrade command implementation

use anyhow::Result;
use tm_core::Direction;

use crate::cli::{DowngradeArgs, GlobalArgs};
use crate::commands::migrate;

/// Execute the downgrade command
pub(crate) async fn execute(args: &DowngradeArgs, global: &GlobalArgs) -> Result<()> {
    migrate::execute(Direction::Downgrade, &args.revision, args.dry_run, global).await
}
