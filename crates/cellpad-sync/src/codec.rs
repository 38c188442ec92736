//! Delimiter codec for `.jsnb` notebooks.
//!
//! A notebook is plain source text with cells separated by a sentinel
//! line:
//!
//! ```text
//! const a = 1
//!
//! /*--< CELL DELIM >--*/
//!
//! a + 1
//! ```
//!
//! The sentinel is a block comment, so the file stays valid source for the
//! notebook's language. Whitespace around each cell is not preserved.

use cellpad_core::{Cell, Document};

use crate::error::{SyncError, SyncResult};

/// Marker separating cells on disk.
pub const CELL_DELIMITER: &str = "/*--< CELL DELIM >--*/";

/// Text placed between two cells when encoding.
pub const CELL_SEPARATOR: &str = "\n\n/*--< CELL DELIM >--*/\n\n";

/// Split notebook text into trimmed cell sources.
///
/// Every segment becomes a cell, including empty ones, so `""` yields a
/// single empty source.
pub fn decode_sources(text: &str) -> Vec<String> {
    text.split(CELL_DELIMITER)
        .map(|segment| segment.trim().to_string())
        .collect()
}

/// Decode notebook text into idle cells without outputs.
pub fn decode(text: &str) -> Vec<Cell> {
    decode_sources(text).into_iter().map(Cell::new).collect()
}

/// Encode cell sources as notebook text.
///
/// Fails if any source contains [`CELL_DELIMITER`], since it would split
/// into extra cells on the next decode. An empty list encodes to `""`.
pub fn encode<S: AsRef<str>>(sources: &[S]) -> SyncResult<String> {
    if let Some(index) = sources
        .iter()
        .position(|source| source.as_ref().contains(CELL_DELIMITER))
    {
        return Err(SyncError::DelimiterInSource { index });
    }

    let mut text = String::new();
    for (i, source) in sources.iter().enumerate() {
        if i > 0 {
            text.push_str(CELL_SEPARATOR);
        }
        text.push_str(source.as_ref());
    }
    Ok(text)
}

/// Encode the current sources of `document`.
pub fn encode_document(document: &Document) -> SyncResult<String> {
    encode(document.sources().as_slice())
}
