//! Runs script statements against one controller and ledger

use std::io::Write;

use rewind_undo_redo::{
    ActionResult, Command, JobHandle, Scope, StackId, UndoRedoController, ALL_SCOPE_NAME,
};
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};
use crate::ledger::Ledger;
use crate::script::{ScriptLine, Statement};

/// Outcome counters for a finished script
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub statements: usize,
    pub failures: usize,
}

/// A demo session: controller, ledger and background submissions
pub struct Session<W: Write> {
    controller: UndoRedoController,
    ledger: Ledger,
    out: W,
    background: Vec<(usize, String, JobHandle)>,
    summary: SessionSummary,
}

impl<W: Write> Session<W> {
    pub fn new(controller: UndoRedoController, ledger: Ledger, out: W) -> Self {
        Self {
            controller,
            ledger,
            out,
            background: Vec::new(),
            summary: SessionSummary::default(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn controller(&self) -> &UndoRedoController {
        &self.controller
    }

    /// Run every line, stopping only on fatal errors
    ///
    /// Command failures are printed and counted; outstanding background
    /// submissions are awaited at the end.
    pub fn run(&mut self, lines: &[ScriptLine]) -> CliResult<SessionSummary> {
        for line in lines {
            self.summary.statements += 1;
            if let Err(e) = self.run_line(line) {
                if e.is_fatal() {
                    return Err(e);
                }
                self.summary.failures += 1;
                warn!(line = line.line, error = %e, "Statement failed");
                writeln!(self.out, "error: {}", e.user_message())?;
            }
        }
        self.wait_background()?;
        Ok(self.summary)
    }

    /// Consume the session, returning its writer
    pub fn into_output(self) -> W {
        self.out
    }

    fn run_line(&mut self, line: &ScriptLine) -> CliResult<()> {
        debug!(line = line.line, statement = ?line.statement, "Running statement");

        match &line.statement {
            Statement::Set {
                scope,
                account,
                value,
            } => {
                let command = self.ledger.set(scope, self.scope(scope)?, account, *value)?;
                self.submit(line, command)
            }
            Statement::Add {
                scope,
                account,
                delta,
            } => {
                let command = self.ledger.add(scope, self.scope(scope)?, account, *delta)?;
                self.submit(line, command)
            }
            Statement::Get { scope, account } => {
                let command = self.ledger.get(scope, self.scope(scope)?, account)?;
                self.submit(line, command)
            }
            Statement::Undo { scope } => {
                let handle = match scope {
                    Some(scope) => self
                        .controller
                        .undo_in_scope(scope)
                        .map_err(CliError::from_scope_lookup)?,
                    None => self.controller.undo()?,
                };
                self.finish(line, "undo".to_string(), handle)
            }
            Statement::Redo { scope } => {
                let handle = match scope {
                    Some(scope) => self
                        .controller
                        .redo_in_scope(scope)
                        .map_err(CliError::from_scope_lookup)?,
                    None => self.controller.redo()?,
                };
                self.finish(line, "redo".to_string(), handle)
            }
            Statement::Jump { index } => {
                let handle = self.controller.set_current_index(*index)?;
                let label = match index {
                    Some(index) => format!("jump {}", index),
                    None => "jump none".to_string(),
                };
                self.finish(line, label, handle)
            }
            Statement::Stack { id } => {
                self.controller.set_active_stack(id.clone().map(StackId::new));
                writeln!(self.out, "stack {}", self.controller.active_stack_id())?;
                Ok(())
            }
            Statement::Limit { limit } => {
                self.controller.set_undo_limit(*limit);
                writeln!(self.out, "limit {}", limit)?;
                Ok(())
            }
            Statement::History => self.print_history(),
            Statement::Queued { scope } => {
                let filter = scope.as_deref().unwrap_or(ALL_SCOPE_NAME);
                let queued = self
                    .controller
                    .queued_command_text_list_by_scope(filter)
                    .map_err(CliError::from_scope_lookup)?;
                writeln!(self.out, "queued [{}]", queued.join(", "))?;
                Ok(())
            }
            Statement::Wait => self.wait_background(),
            Statement::Balances => {
                for ((scope, account), balance) in self.ledger.snapshot() {
                    writeln!(self.out, "{} {} = {}", scope, account, balance)?;
                }
                Ok(())
            }
            Statement::Clear => {
                self.controller.clear();
                writeln!(self.out, "cleared")?;
                Ok(())
            }
            Statement::Scopes => {
                let scopes = self.controller.scopes();
                writeln!(self.out, "scopes [{}]", scopes.names().join(", "))?;
                Ok(())
            }
        }
    }

    fn scope(&self, name: &str) -> CliResult<Scope> {
        self.controller
            .scopes()
            .scope(name)
            .map_err(CliError::from_scope_lookup)
    }

    fn submit(&mut self, line: &ScriptLine, command: Command) -> CliResult<()> {
        let text = command.text().to_string();
        let handle = self.controller.enqueue(command)?;
        if line.background {
            writeln!(self.out, "queued {}", text)?;
            self.background.push((line.line, text, handle));
            Ok(())
        } else {
            self.finish(line, text, handle)
        }
    }

    fn finish(&mut self, line: &ScriptLine, label: String, handle: JobHandle) -> CliResult<()> {
        if line.background {
            self.background.push((line.line, label, handle));
            return Ok(());
        }
        let result = handle.wait_blocking();
        self.report(&label, result)
    }

    fn wait_background(&mut self) -> CliResult<()> {
        for (line, label, handle) in std::mem::take(&mut self.background) {
            let result = handle.wait_blocking();
            if let Err(e) = self.report(&label, result) {
                self.summary.failures += 1;
                warn!(line, error = %e, "Background statement failed");
                writeln!(self.out, "error: {}", e.user_message())?;
            }
        }
        Ok(())
    }

    fn report(&mut self, label: &str, result: ActionResult) -> CliResult<()> {
        let value = result?;
        if value.is_null() {
            writeln!(self.out, "ok {}", label)?;
        } else {
            writeln!(self.out, "ok {} -> {}", label, value)?;
        }
        Ok(())
    }

    fn print_history(&mut self) -> CliResult<()> {
        let current = self.controller.current_index();
        writeln!(
            self.out,
            "history {} ({} commands)",
            self.controller.active_stack_id(),
            self.controller.number_of_commands()
        )?;
        for entry in self.controller.history() {
            let marker = if Some(entry.index) == current { '>' } else { ' ' };
            let state = if entry.is_undone { " (undone)" } else { "" };
            writeln!(self.out, "{} {}: {}{}", marker, entry.index, entry.text, state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;
    use rewind_undo_redo::EngineConfig;

    fn session() -> Session<Vec<u8>> {
        let controller =
            UndoRedoController::from_config(EngineConfig::new().with_scopes(["brand", "car"]))
                .unwrap();
        Session::new(controller, Ledger::new(), Vec::new())
    }

    fn output(session: Session<Vec<u8>>) -> String {
        String::from_utf8(session.into_output()).unwrap()
    }

    #[test]
    fn test_set_undo_redo_round_trip() {
        let mut session = session();
        let lines = parse_script("set brand acme 10\nadd brand acme 5\nundo\nget brand acme\nredo\n")
            .unwrap();

        let summary = session.run(&lines).unwrap();
        assert_eq!(summary.failures, 0);
        assert_eq!(session.ledger().balance("brand", "acme"), Some(15));

        let text = output(session);
        assert!(text.contains("ok set brand acme = 10 -> 10"));
        assert!(text.contains("ok get brand acme -> 10"));
        assert!(text.contains("ok redo -> 15"));
    }

    #[test]
    fn test_failures_are_reported_and_counted() {
        let mut session = session();
        let lines = parse_script("undo\nget car fleet\nset car fleet 1\n").unwrap();

        let summary = session.run(&lines).unwrap();
        assert_eq!(
            summary,
            SessionSummary {
                statements: 3,
                failures: 2
            }
        );
        let text = output(session);
        assert!(text.contains("error: No more undos available"));
        assert!(text.contains("no account 'fleet' in scope 'car'"));
    }

    #[test]
    fn test_unknown_scope_is_fatal() {
        let mut session = session();
        let lines = parse_script("set boat dinghy 1\nset brand acme 1\n").unwrap();

        let err = session.run(&lines).unwrap_err();
        assert!(matches!(err, CliError::Scope(_)));
        assert_eq!(session.ledger().balance("brand", "acme"), None);
    }

    #[test]
    fn test_history_marks_cursor() {
        let mut session = session();
        let lines =
            parse_script("set brand a 1\nset brand b 2\nset car c 3\njump 0\nhistory\n").unwrap();
        session.run(&lines).unwrap();

        let text = output(session);
        assert!(text.contains("history default (3 commands)"));
        assert!(text.contains("> 0: set brand a = 1\n"));
        assert!(text.contains("  2: set car c = 3 (undone)"));
    }
}
