//! Execution engine for Cellpad notebooks.
//!
//! # Architecture
//!
//! ```text
//! KernelProvider
//!     │
//!     └── CellExecutor (one per document)
//!             │
//!             ├── RunRegistry: claimed cells + cancellation tokens
//!             │
//!             └── Session (one per document)
//!                     │
//!                     └── ProcessSession ── InterpreterHandle ── node
//! ```
//!
//! # Module Structure
//!
//! - `context` - Execution callbacks and run bookkeeping
//! - `executor` - CellExecutor for single, batch and sequential runs

mod context;
mod executor;

pub use context::ExecutionCallback;
pub use executor::CellExecutor;
