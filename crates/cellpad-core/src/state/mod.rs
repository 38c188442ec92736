//! In-memory notebook state.
//!
//! This module provides:
//! - Cells with run-state metadata and transient outputs
//! - Documents as ordered, shareable cell lists
//! - Output representation (mime bundles and error outputs)

mod cell;
mod document;
mod output;

pub use cell::{Cell, CellId, CellMetadata, CellSnapshot, RunState};
pub use document::Document;
pub use output::{CellOutput, MimeBundle, TEXT_PLAIN};
