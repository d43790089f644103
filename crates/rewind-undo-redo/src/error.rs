//! Error types for the undo/redo engine

use thiserror::Error;

/// Errors that can occur in the undo/redo engine
///
/// Variants fall into three families:
/// - validation failures, rejected before anything is scheduled
/// - execution failures, reported by a command's own action
/// - unknown failures, raised when an action panics
///
/// Everything else is bookkeeping reported by a scheduled job.
#[derive(Debug, Error)]
pub enum UndoRedoError {
    /// The reserved wildcard name was registered as a user scope
    #[error("Scope name '{0}' is reserved")]
    ReservedScopeName(String),

    /// A scope name was registered twice
    #[error("Scope already registered: {0}")]
    DuplicateScope(String),

    /// More scopes than the bitset can represent
    #[error("Too many scopes: {count} registered, at most {max} supported")]
    TooManyScopes {
        /// Number of scopes requested
        count: usize,
        /// Maximum number of representable scopes
        max: usize,
    },

    /// A scope name that was never registered
    #[error("Unknown scope: {0}")]
    UnknownScope(String),

    /// A command was built without a forward action
    #[error("Command '{0}' has no forward action")]
    MissingForwardAction(String),

    /// Generic validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A requested history position does not exist
    #[error("Index {index} out of range for stack with {count} commands")]
    IndexOutOfRange {
        /// Requested cursor position
        index: usize,
        /// Number of commands in the stack
        count: usize,
    },

    /// The command's action reported a domain error
    #[error("Command '{command}' failed: {message}")]
    ExecutionFailed {
        /// Display text of the failing command
        command: String,
        /// Error reported by the action
        message: String,
    },

    /// The command's action panicked
    #[error("Critical failure in command '{command}': {message}")]
    UnknownFailure {
        /// Display text of the failing command
        command: String,
        /// Panic payload, when it was a string
        message: String,
    },

    /// No more undos available
    #[error("No more undos available")]
    NoMoreUndos,

    /// No more redos available
    #[error("No more redos available")]
    NoMoreRedos,

    /// The job was discarded before it ran
    #[error("Operation cancelled before execution")]
    Cancelled,

    /// The worker is gone
    #[error("Undo/redo engine has shut down")]
    EngineShutdown,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl UndoRedoError {
    /// Create a new ValidationError with context
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a new ExecutionFailed error for a command
    pub fn execution_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a new UnknownScope error
    pub fn unknown_scope(name: impl Into<String>) -> Self {
        Self::UnknownScope(name.into())
    }

    /// Create a new ConfigError with context
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// True for errors rejected before scheduling
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::ReservedScopeName(_)
                | Self::DuplicateScope(_)
                | Self::TooManyScopes { .. }
                | Self::UnknownScope(_)
                | Self::MissingForwardAction(_)
                | Self::ValidationError(_)
        )
    }

    /// True when the failure came out of a command's action
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            Self::ExecutionFailed { .. } | Self::UnknownFailure { .. }
        )
    }
}

/// Result type for undo/redo operations
pub type Result<T> = std::result::Result<T, UndoRedoError>;
