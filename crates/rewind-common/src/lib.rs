//! Shared utilities for rewind crates
//!
//! Kept free of dependencies on other rewind crates so every crate in the
//! workspace can depend on it.

pub mod logging;

pub use logging::{format_error, init, LogLevel, LogOptions, LoggingError};
