//! CLI command implementations

pub(crate) mod common;
pub(crate) mod current;
pub(crate) mod downgrade;
pub(crate) mod heads;
pub(crate) mod history;
pub(crate) mod migrate;
pub(crate) mod revision;
pub(crate) mod stamp;
pub(crate) mod upgrade;
