// rewind CLI entry point

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use rewind_cli::{run, Cli, CliError};
use rewind_common::{format_error, LogOptions};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = rewind_common::init(LogOptions {
        level: Some(cli.log_level()),
        debug: cli.verbose,
        respect_env: true,
    }) {
        eprintln!("warning: {}", e);
    }

    match execute(&cli) {
        Ok(failures) if failures > 0 => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format_error(&*e), "rewind failed");
            match e.downcast_ref::<CliError>() {
                Some(cli_error) => eprintln!("{}", cli_error.user_message()),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> anyhow::Result<usize> {
    let stdout = io::stdout();
    let summary = run(cli, stdout.lock()).context("script aborted")?;
    Ok(summary.failures)
}
