//! Engine configuration
//!
//! Loaded from YAML or JSON (picked by file extension) or built in code.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UndoRedoError};
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::scope::{Scopes, ALL_SCOPE_NAME};
use crate::stack::StackId;

/// Configuration for an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum commands kept per stack (0 = unlimited)
    pub undo_limit: usize,
    /// Scope names, in bit order
    pub scopes: Vec<String>,
    /// Stack targeted when no other is selected
    pub default_stack: String,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
    /// Scope name to stack id routing for undirected commands
    pub routes: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_limit: 0,
            scopes: Vec::new(),
            default_stack: StackId::DEFAULT.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            routes: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Create a default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scope names
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the undo limit
    pub fn with_undo_limit(mut self, limit: usize) -> Self {
        self.undo_limit = limit;
        self
    }

    /// Route commands of `scope` to `stack`
    pub fn with_route(mut self, scope: impl Into<String>, stack: impl Into<String>) -> Self {
        self.routes.insert(scope.into(), stack.into());
        self
    }

    /// Set the default stack
    pub fn with_default_stack(mut self, stack: impl Into<String>) -> Self {
        self.default_stack = stack.into();
        self
    }

    /// Default stack as a [`StackId`]
    pub fn default_stack_id(&self) -> StackId {
        StackId::new(self.default_stack.clone())
    }

    /// Check the configuration and build its scope registry
    pub fn validate(&self) -> Result<Scopes> {
        if self.default_stack.trim().is_empty() {
            return Err(UndoRedoError::config_error("default_stack cannot be empty"));
        }
        if self.event_capacity == 0 {
            return Err(UndoRedoError::config_error("event_capacity must be positive"));
        }

        let scopes = Scopes::new(&self.scopes)?;

        for (scope, stack) in &self.routes {
            if scope == ALL_SCOPE_NAME {
                return Err(UndoRedoError::validation_error(
                    "routes need a specific scope, not 'all'",
                ));
            }
            if scopes.flags_for(scope).is_none() {
                return Err(UndoRedoError::unknown_scope(scope.clone()));
            }
            if stack.trim().is_empty() {
                return Err(UndoRedoError::config_error(format!(
                    "route for scope '{}' has an empty stack id",
                    scope
                )));
            }
        }

        Ok(scopes)
    }

    /// Load from a YAML file
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            UndoRedoError::config_error(format!("Failed to read config file: {}", e))
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load from a JSON file
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            UndoRedoError::config_error(format!("Failed to read config file: {}", e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from a file (auto-detect format)
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match extension(path) {
            "yaml" | "yml" => Self::load_from_yaml(path),
            "json" => Self::load_from_json(path),
            _ => Err(UndoRedoError::config_error(
                "Unsupported file format. Use .yaml, .yml, or .json",
            )),
        }
    }

    /// Save to a file (auto-detect format)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match extension(path) {
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            "json" => serde_json::to_string_pretty(self)?,
            _ => {
                return Err(UndoRedoError::config_error(
                    "Unsupported file format. Use .yaml, .yml, or .json",
                ))
            }
        };
        fs::write(path, content).map_err(|e| {
            UndoRedoError::config_error(format!("Failed to write config file: {}", e))
        })
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|ext| ext.to_str()).unwrap_or("")
}
