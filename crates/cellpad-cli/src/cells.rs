//! Cells command: list the cells of a notebook without running them.

use cellpad_sync::ContentProvider;

use crate::colors;
use crate::executor::resolve_notebook;

const PREVIEW_WIDTH: usize = 60;

/// Print one line per cell: number, line count, and first non-blank line.
pub async fn execute(notebook_path: &str) -> anyhow::Result<()> {
    let path = resolve_notebook(notebook_path)?;
    let data = ContentProvider::new().open(&path).await?;

    println!(
        "{}{}{} {}({} cells, {}){}",
        colors::BOLD,
        path.display(),
        colors::RESET,
        colors::DIM,
        data.cells.len(),
        data.languages.join(", "),
        colors::RESET
    );

    for (index, cell) in data.cells.iter().enumerate() {
        let source = cell.source();
        let lines = source.lines().count();
        println!(
            "{}[{}]{} {}{:>3} lines{}  {}",
            colors::CYAN,
            index + 1,
            colors::RESET,
            colors::DIM,
            lines,
            colors::RESET,
            preview(&source)
        );
    }
    Ok(())
}

fn preview(source: &str) -> String {
    let first = source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("(empty)");
    if first.chars().count() > PREVIEW_WIDTH {
        let cut: String = first.chars().take(PREVIEW_WIDTH - 3).collect();
        format!("{}...", cut)
    } else {
        first.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("\n\n  const a = 1;\nmore"), "const a = 1;");
        assert_eq!(preview(""), "(empty)");
        let long = "x".repeat(100);
        assert_eq!(preview(&long).chars().count(), PREVIEW_WIDTH);
    }
}
