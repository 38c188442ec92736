//! Core engine for Cellpad notebooks.
//!
//! This crate provides:
//! - Document and cell state with run-state metadata
//! - Persistent interpreter sessions over a line-delimited JSON pipe
//! - Cell execution with cancellation and progress callbacks
//! - Per-document kernel management

pub mod config;
pub mod error;
pub mod execute;
pub mod ipc;
pub mod kernel;
pub mod session;
pub mod state;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use execute::{CellExecutor, ExecutionCallback};
pub use kernel::{KernelProvider, ProcessSessionFactory, SessionFactory};
pub use session::{
    ExecutionError, ExecutionOutput, ExecutionResult, ProcessSession, RaisedError, Session,
};
pub use state::{
    Cell, CellId, CellMetadata, CellOutput, CellSnapshot, Document, MimeBundle, RunState,
    TEXT_PLAIN,
};
pub use tokio_util::sync::CancellationToken;
