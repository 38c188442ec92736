//! Error types for cellpad-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::state::CellId;

/// Result type for cellpad-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cellpad-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to start the interpreter process.
    #[error("failed to spawn interpreter '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IPC communication error with the interpreter process.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// The interpreter sent a reply that could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The interpreter did not answer within the configured timeout.
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    /// The cell is already running in this kernel.
    #[error("execution already in progress for {0}")]
    ExecutionInProgress(CellId),

    /// Cell not found.
    #[error("cell not found: {0}")]
    CellNotFound(CellId),

    /// Invalid operation (e.g., inserting past the end of a document).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Format the error with a recovery hint when one is known.
    pub fn with_hint(&self) -> String {
        match self {
            Error::Spawn { .. } => format!(
                "{self}\n  hint: install Node.js or set {} to the interpreter binary",
                crate::config::INTERPRETER_ENV
            ),
            Error::Timeout(_) => {
                format!("{self}\n  hint: raise --timeout or interrupt long-running cells")
            }
            _ => self.to_string(),
        }
    }
}
