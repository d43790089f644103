// Argument parsing and dispatch

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use rewind_common::LogLevel;
use rewind_undo_redo::{EngineConfig, UndoRedoController};
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::ledger::Ledger;
use crate::script::parse_script;
use crate::session::{Session, SessionSummary};

/// rewind - scriptable ledger on a threaded undo/redo engine
#[derive(Parser, Debug)]
#[command(name = "rewind")]
#[command(bin_name = "rewind")]
#[command(about = "Run ledger scripts against the rewind undo/redo engine")]
#[command(
    long_about = "Run ledger scripts against the rewind undo/redo engine.\n\nStatements: set, add, get, undo, redo, jump, stack, limit, history,\nqueued, wait, balances, clear, scopes. A trailing '&' submits without waiting."
)]
#[command(version)]
#[command(author = "Rewind Contributors")]
pub struct Cli {
    /// Engine configuration file (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Scope names, comma separated (overrides the config file)
    #[arg(short, long, value_name = "NAMES")]
    pub scopes: Option<String>,

    /// Commands kept per stack, 0 for unlimited (overrides the config file)
    #[arg(short = 'l', long, value_name = "N")]
    pub undo_limit: Option<usize>,

    /// Script to run; reads stdin when omitted
    #[arg(value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Minimum log level
    #[arg(long, value_name = "LEVEL", value_parser = parse_level)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Minimize output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn parse_level(value: &str) -> Result<LogLevel, String> {
    LogLevel::parse(value).ok_or_else(|| format!("unknown log level '{}'", value))
}

impl Cli {
    /// Effective log level: explicit flag, then verbose/quiet, then info
    pub fn log_level(&self) -> LogLevel {
        match (self.log_level, self.verbose, self.quiet) {
            (Some(level), _, _) => level,
            (None, true, _) => LogLevel::Debug,
            (None, _, true) => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    /// Config file contents with command-line overrides applied
    pub fn engine_config(&self) -> CliResult<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load_from_file(path).map_err(CliError::Config)?,
            None => EngineConfig::default(),
        };

        if let Some(scopes) = &self.scopes {
            config.scopes = scopes
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(limit) = self.undo_limit {
            config.undo_limit = limit;
        }

        Ok(config)
    }

    fn read_script(&self) -> CliResult<String> {
        match &self.script {
            Some(path) => Ok(fs::read_to_string(path)?),
            None => {
                let mut source = String::new();
                io::stdin().read_to_string(&mut source)?;
                Ok(source)
            }
        }
    }
}

/// Build the engine, run the script, and report to `out`
pub fn run<W: Write>(cli: &Cli, out: W) -> CliResult<SessionSummary> {
    let config = cli.engine_config()?;
    let controller = UndoRedoController::from_config(config).map_err(|e| {
        if e.is_validation_failure() {
            CliError::Scope(e)
        } else {
            CliError::Config(e)
        }
    })?;

    let source = cli.read_script()?;
    let lines = parse_script(&source)?;
    info!(statements = lines.len(), "Running script");

    let mut session = Session::new(controller.clone(), Ledger::new(), out);
    let summary = session.run(&lines)?;

    if !cli.quiet {
        let mut out = session.into_output();
        writeln!(
            out,
            "done: {} statements, {} failed, {} commands on stack {}",
            summary.statements,
            summary.failures,
            controller.number_of_commands(),
            controller.active_stack_id()
        )?;
    }

    controller.engine().shutdown();
    Ok(summary)
}
