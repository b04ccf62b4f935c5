//! Tidemark CLI - linear schema migrations for DuckDB

use clap::Parser;
use std::process::ExitCode;

mod cli;
mod commands;

use cli::Cli;
use commands::{current, downgrade, heads, history, revision, stamp, upgrade};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let result = match &cli.command {
        cli::Commands::Upgrade(args) => upgrade::execute(args, &cli.global).await,
        cli::Commands::Downgrade(args) => downgrade::execute(args, &cli.global).await,
        cli::Commands::Current(args) => current::execute(args, &cli.global).await,
        cli::Commands::History(args) => history::execute(args, &cli.global).await,
        cli::Commands::Heads(args) => heads::execute(args, &cli.global).await,
        cli::Commands::Stamp(args) => stamp::execute(args, &cli.global).await,
        cli::Commands::Revision(args) => revision::execute(args, &cli.global).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<commands::common::ExitCode>() {
            Some(code) => ExitCode::from(code.0),
            None => {
                eprintln!("Error: {err:#}");
                ExitCode::from(commands::common::EXIT_FAILURE)
            }
        },
    }
}

/// `--verbose` raises the default filter to debug; `RUST_LOG` overrides both.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}
