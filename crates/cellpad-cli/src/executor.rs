//! Shared notebook execution pipeline for Cellpad CLI.
//!
//! Used by the `run` and `watch` commands: open the notebook, run its cells
//! in one kernel, print the outputs, and shut the interpreter down.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cellpad_core::{
    CellId, CellOutput, Document, ExecutionCallback, KernelProvider, RunState, SessionConfig,
};
use cellpad_sync::ContentProvider;

use crate::colors;
use crate::output::{format_duration, print_output};

/// Progress callback that prints execution status to the terminal.
///
/// Cells may finish in any order, so every event gets its own line.
pub struct ProgressCallback {
    /// Cell ids in document order, for numbering.
    ids: Vec<CellId>,
}

impl ProgressCallback {
    pub fn new(document: &Document) -> Self {
        Self {
            ids: document.cells().iter().map(|c| c.id()).collect(),
        }
    }

    fn number(&self, cell_id: CellId) -> String {
        match self.ids.iter().position(|&id| id == cell_id) {
            Some(index) => format!("[{}]", index + 1),
            None => cell_id.to_string(),
        }
    }
}

impl ExecutionCallback for ProgressCallback {
    fn on_cell_started(&self, cell_id: CellId) {
        println!(
            "{}  ▶ Running{} {}",
            colors::CYAN,
            colors::RESET,
            self.number(cell_id)
        );
    }

    fn on_cell_completed(&self, cell_id: CellId, duration: Duration) {
        println!(
            "{}  ✓{} {} {}{}{}",
            colors::GREEN,
            colors::RESET,
            self.number(cell_id),
            colors::DIM,
            format_duration(duration.as_secs_f64()),
            colors::RESET
        );
    }

    fn on_cell_error(&self, cell_id: CellId, output: &CellOutput) {
        let name = match output {
            CellOutput::Error { name, .. } => name.as_str(),
            CellOutput::Rich { .. } => "error",
        };
        println!(
            "{}  ✗{} {} {}",
            colors::RED,
            colors::RESET,
            self.number(cell_id),
            name
        );
    }

    fn on_cell_cancelled(&self, cell_id: CellId) {
        println!(
            "{}  ■ Cancelled{} {}",
            colors::YELLOW,
            colors::RESET,
            self.number(cell_id)
        );
    }
}

/// How to run a notebook.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run only this cell (1-based).
    pub cell: Option<usize>,
    /// Wait for each cell before starting the next.
    pub sequential: bool,
    /// Interpreter settings.
    pub session: SessionConfig,
}

/// Outcome of one notebook run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    fn record(&mut self, state: RunState) {
        match state {
            RunState::Success => self.succeeded += 1,
            RunState::Error => self.failed += 1,
            RunState::Idle | RunState::Running => self.cancelled += 1,
        }
    }
}

/// Resolve a notebook path given on the command line.
pub fn resolve_notebook(notebook_path: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(notebook_path);
    if !path.exists() {
        anyhow::bail!("Notebook not found: {}", notebook_path);
    }
    Ok(path.canonicalize()?)
}

/// Run the notebook at `path` once and print its outputs.
pub async fn run_notebook(path: &Path, options: &RunOptions) -> anyhow::Result<RunSummary> {
    let start = Instant::now();

    let document = ContentProvider::new().open_document(path).await?;
    print_header(&document);

    let selected: Vec<usize> = match options.cell {
        Some(number) if number == 0 || number > document.len() => {
            anyhow::bail!(
                "Cell {} not found (notebook has {} cells)",
                number,
                document.len()
            );
        }
        Some(number) => vec![number - 1],
        None => (0..document.len()).collect(),
    };

    let provider = KernelProvider::with_config(options.session.clone())
        .with_callback(ProgressCallback::new(&document));
    let kernel = provider.provide_kernel(&document);

    // Ctrl+C cancels whatever is queued or running; outputs are still printed.
    let interrupt = {
        let kernel = kernel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let cancelled = kernel.cancel_all_cells_execution();
                eprintln!(
                    "\n{}Interrupted:{} cancelled {} cells",
                    colors::YELLOW,
                    colors::RESET,
                    cancelled
                );
            }
        })
    };

    println!("\n{}Executing...{}", colors::BOLD, colors::RESET);
    let result = execute(&provider, &document, options, &selected).await;
    interrupt.abort();

    if let Err(e) = kernel.session().shutdown().await {
        tracing::warn!("Failed to shut down interpreter: {}", e);
    }
    provider.close_document(document.path());
    result?;

    println!("\n{}Outputs:{}", colors::BOLD, colors::RESET);
    println!("{}", "─".repeat(50));

    let cells = document.cells();
    let mut summary = RunSummary::default();
    for &index in &selected {
        let snapshot = cells[index].snapshot();
        summary.record(snapshot.metadata.run_state);
        print_output(index + 1, &snapshot);
    }
    summary.elapsed = start.elapsed();

    println!("\n{}", "─".repeat(50));
    print_summary(&summary);
    Ok(summary)
}

async fn execute(
    provider: &KernelProvider,
    document: &Arc<Document>,
    options: &RunOptions,
    selected: &[usize],
) -> anyhow::Result<()> {
    if let [index] = selected
        && options.cell.is_some()
    {
        if let Some(cell) = document.cell(*index) {
            provider.execute_cell(document, &cell).await?;
        }
        return Ok(());
    }

    if options.sequential {
        let kernel = provider.provide_kernel(document);
        for result in kernel.execute_all_cells_sequential(document).await {
            result?;
        }
    } else {
        for handle in provider.execute_all_cells(document) {
            handle.await??;
        }
    }
    Ok(())
}

fn print_header(document: &Document) {
    let name = document
        .path()
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    println!(
        "\n{}Cellpad{} - {}{}{} {}({} cells){}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        name,
        colors::RESET,
        colors::DIM,
        document.len(),
        colors::RESET
    );
}

fn print_summary(summary: &RunSummary) {
    let color = if summary.failed > 0 {
        colors::RED
    } else {
        colors::GREEN
    };
    print!(
        "{}Completed{} {} cells in {}",
        color,
        colors::RESET,
        summary.succeeded + summary.failed,
        format_duration(summary.elapsed.as_secs_f64())
    );
    if summary.failed > 0 {
        print!(" ({}{} failed{})", colors::RED, summary.failed, colors::RESET);
    }
    if summary.cancelled > 0 {
        print!(
            " ({}{} cancelled{})",
            colors::YELLOW,
            summary.cancelled,
            colors::RESET
        );
    }
    println!();
    colors::flush_stdout();
}
