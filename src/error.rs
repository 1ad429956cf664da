// Error types for unitwatch

use crate::systemd::{ActionVerb, QueryKind, Scope};
use thiserror::Error;

/// Result type alias using anyhow::Error
pub type Result<T> = anyhow::Result<T>;

/// Unitwatch-specific error types
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("{scope} query '{query}' failed: {message}")]
    Query {
        scope: Scope,
        query: QueryKind,
        message: String,
    },

    #[error("Failed to initialize {scope} watcher: {message}")]
    Initialization { scope: Scope, message: String },

    #[error("systemctl {verb} {units} failed: {message}")]
    Action {
        verb: ActionVerb,
        units: String,
        message: String,
    },

    #[error("Invalid unit name: {0}")]
    InvalidUnitName(String),

    #[error("The {0} watcher has not been initialized")]
    NotInitialized(Scope),

    #[error("Invalid command: {0}")]
    Command(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
