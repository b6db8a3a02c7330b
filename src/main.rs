//! `automate` command-line host.
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use automate_cli::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    if matches!(args.command, cli::Command::Version) {
        commands::version::run();
        return Ok(());
    }

    logging::init_subscriber(args.verbose, args.command.name());
    let log = Arc::new(logging::Logger::new(args.command.name()));
    let session = commands::Session::init(&args.global, log)?;

    match &args.command {
        cli::Command::Drivers(opts) => commands::drivers::run(&session, opts),
        cli::Command::Package(opts) => commands::package::run(&session, opts),
        cli::Command::Service(opts) => commands::service::run(&session, opts),
        cli::Command::File(opts) => commands::file::run(&session, opts),
        cli::Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
