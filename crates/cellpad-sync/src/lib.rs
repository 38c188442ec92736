//! Sync engine for Cellpad notebooks.
//!
//! Converts between `.jsnb` notebook files and in-memory documents.
//!
//! # Architecture
//!
//! ```text
//! notes.jsnb ──► ContentProvider::open ──► codec::decode ──► NotebookData ──► Document
//!                                                                               │
//! notes.jsnb ◄── ContentProvider::save ◄── codec::encode ◄──────────────────────┘
//! ```

pub mod codec;
mod content;
mod error;

pub use codec::{CELL_DELIMITER, decode, encode, encode_document};
pub use content::{Backup, ContentProvider, NotebookData, NotebookMetadata};
pub use error::{SyncError, SyncResult};

use std::path::{Path, PathBuf};

/// File extension of Cellpad notebooks.
pub const NOTEBOOK_EXTENSION: &str = "jsnb";

/// Get the notebook path for `name`, adding the `.jsnb` extension when missing.
pub fn notebook_path(name: impl AsRef<Path>) -> PathBuf {
    let name = name.as_ref();
    if name.extension().is_some_and(|ext| ext == NOTEBOOK_EXTENSION) {
        name.to_path_buf()
    } else {
        name.with_extension(NOTEBOOK_EXTENSION)
    }
}

/// Default backup location for the notebook at `path`.
pub fn default_backup_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.bak", name))
}
