//! Cell output representation.
//!
//! Outputs are transient: they live on the cell until the next execution
//! and are never written to the notebook file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping from MIME type to the rendered value for that type.
pub type MimeBundle = BTreeMap<String, serde_json::Value>;

/// MIME type used for plain text renderings.
pub const TEXT_PLAIN: &str = "text/plain";

/// Output attached to a cell after it ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum CellOutput {
    /// A rendered value.
    Rich {
        /// Renderings keyed by MIME type.
        data: MimeBundle,
    },
    /// An error raised by the cell's code (or by the kernel running it).
    Error {
        /// Error class name (e.g. `ReferenceError`).
        name: String,
        /// Human readable message.
        message: String,
        /// Stack trace as reported by the interpreter.
        trace: String,
    },
}

impl CellOutput {
    /// Create a rich output holding only a `text/plain` rendering.
    pub fn text(text: impl Into<String>) -> Self {
        let mut data = MimeBundle::new();
        data.insert(TEXT_PLAIN.to_string(), serde_json::Value::String(text.into()));
        Self::Rich { data }
    }

    /// Whether this is an error output.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The `text/plain` rendering, if this is a rich output that has one.
    pub fn plain_text(&self) -> Option<&str> {
        match self {
            Self::Rich { data } => data.get(TEXT_PLAIN).and_then(|v| v.as_str()),
            Self::Error { .. } => None,
        }
    }
}
