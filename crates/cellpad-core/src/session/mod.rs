//! Interactive sessions.
//!
//! A session runs code strings in one persistent interpreter and answers
//! each call with a tagged result. Whatever shape the interpreter speaks,
//! callers only ever see [`ExecutionOutput`] or [`ExecutionError`].

mod process;

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::state::{CellOutput, MimeBundle};

pub use process::ProcessSession;

/// Successful evaluation: one rendered value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    pub mime: MimeBundle,
}

/// An error raised by the evaluated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaisedError {
    pub name: String,
    pub message: String,
    pub trace: String,
}

/// Why an execution did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The code raised an error in the target language.
    #[error("{}: {}", .0.name, .0.message)]
    Raised(RaisedError),

    /// The execution was cancelled before it settled.
    #[error("execution cancelled")]
    Cancelled,

    /// The interpreter process failed (crash, protocol fault, timeout).
    #[error(transparent)]
    Kernel(#[from] Error),
}

impl ExecutionError {
    /// Render the error as a cell output.
    ///
    /// A cancelled run has no output and yields `None`.
    pub fn to_output(&self) -> Option<CellOutput> {
        match self {
            Self::Raised(raised) => Some(CellOutput::Error {
                name: raised.name.clone(),
                message: raised.message.clone(),
                trace: raised.trace.clone(),
            }),
            Self::Cancelled => None,
            Self::Kernel(e) => Some(CellOutput::Error {
                name: "KernelError".to_string(),
                message: e.to_string(),
                trace: String::new(),
            }),
        }
    }
}

/// Result of one `execute` call.
pub type ExecutionResult = std::result::Result<ExecutionOutput, ExecutionError>;

/// A persistent interpreter scoped to one document.
///
/// Each call settles exactly once, and its result belongs to that call
/// only. Implementations backed by a single-request process must queue
/// concurrent calls and resolve them in arrival order. A call arrives the
/// first time its future is polled: by then it must hold its place in the
/// queue, since callers order batches on that.
#[async_trait]
pub trait Session: Send + Sync {
    /// Evaluate `code`.
    async fn execute(&self, code: &str) -> ExecutionResult;

    /// Evaluate `code`, giving up when `cancel` fires.
    ///
    /// The default races [`Session::execute`] against the token, which
    /// abandons the pending call. Sessions that can interrupt running code
    /// should override this.
    async fn execute_cancellable(&self, code: &str, cancel: &CancellationToken) -> ExecutionResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
            result = self.execute(code) => result,
        }
    }

    /// Directory code runs in.
    fn working_dir(&self) -> &Path;

    /// Release the interpreter. Later calls may start a new one.
    async fn shutdown(&self) -> crate::Result<()> {
        Ok(())
    }
}
