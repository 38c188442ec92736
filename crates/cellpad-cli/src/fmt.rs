//! Fmt command: normalize the cell layout of a notebook.
//!
//! Rewrites the file in canonical form: trimmed cells separated by the
//! delimiter on its own line between blank lines.

use cellpad_core::Document;
use cellpad_sync::{ContentProvider, codec};

use crate::colors;
use crate::executor::resolve_notebook;

/// Format a notebook in place, or only report with `check`.
pub async fn execute(notebook_path: &str, check: bool) -> anyhow::Result<()> {
    let path = resolve_notebook(notebook_path)?;
    let provider = ContentProvider::new();
    let (original, lossy) = provider.read_text(&path).await?;
    let document = Document::new(&path, codec::decode(&original));
    let formatted = codec::encode_document(&document)?;

    // Replaced bytes always need writing back, even if the text round-trips.
    if !lossy && formatted == original {
        println!("{}Already formatted:{} {}", colors::GREEN, colors::RESET, path.display());
        return Ok(());
    }

    if check {
        anyhow::bail!("Notebook is not formatted: {}", path.display());
    }

    provider.save(&document).await?;
    println!("{}Formatted:{} {}", colors::GREEN, colors::RESET, path.display());
    Ok(())
}
