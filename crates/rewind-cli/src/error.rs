// CLI error types

use rewind_undo_redo::UndoRedoError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Scope error: {0}")]
    Scope(UndoRedoError),

    #[error("Configuration error: {0}")]
    Config(UndoRedoError),

    #[error("Engine error: {0}")]
    Engine(#[from] UndoRedoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Script syntax error at `line` (1-based)
    pub fn script(line: usize, message: impl Into<String>) -> Self {
        CliError::Script {
            line,
            message: message.into(),
        }
    }

    /// Sort an engine error raised while resolving scope names
    ///
    /// Scope validation failures are treated as fatal by the binary.
    pub fn from_scope_lookup(error: UndoRedoError) -> Self {
        if error.is_validation_failure() {
            CliError::Scope(error)
        } else {
            CliError::Engine(error)
        }
    }

    /// Whether the process should stop instead of reporting and moving on
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CliError::Scope(_) | CliError::Config(_) | CliError::Io(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!("Invalid argument: {}\n\nRun 'rewind --help' for usage information.", message)
            }
            CliError::Script { line, message } => {
                format!("Script error on line {}: {}", line, message)
            }
            CliError::Scope(e) => {
                format!("Scope error: {}\n\nRegister scopes with --scopes or the config file.", e)
            }
            CliError::Config(e) => {
                format!("Configuration error: {}\n\nCheck the file passed with --config.", e)
            }
            CliError::Engine(e) => format!("{}", e),
            CliError::Io(e) => format!("File operation failed: {}", e),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
