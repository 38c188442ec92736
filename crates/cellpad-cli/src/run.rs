//! Run command implementation for Cellpad CLI.
//!
//! Executes a notebook headlessly and reports every cell's output.

use crate::executor::{RunOptions, resolve_notebook, run_notebook};

/// Execute a notebook. Fails if any cell ended in an error.
pub async fn execute(notebook_path: &str, options: RunOptions) -> anyhow::Result<()> {
    let path = resolve_notebook(notebook_path)?;
    let summary = run_notebook(&path, &options).await?;

    if summary.failed > 0 {
        anyhow::bail!("{} of {} cells failed", summary.failed, summary.succeeded + summary.failed);
    }
    Ok(())
}
