//! Cellpad CLI - Notebooks for JavaScript in a persistent interpreter.

mod cells;
mod colors;
mod executor;
mod fmt;
mod output;
mod run;
mod watch;
mod watcher;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use cellpad_core::{Cell, Document, SessionConfig};
use cellpad_sync::{ContentProvider, notebook_path};
use executor::RunOptions;

#[derive(Parser)]
#[command(name = "cellpad")]
#[command(about = "Notebooks for JavaScript in a persistent interpreter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args, Clone)]
struct SessionArgs {
    /// Interpreter binary (defaults to $CELLPAD_INTERPRETER or node on PATH)
    #[arg(long)]
    interpreter: Option<PathBuf>,

    /// Kill a cell that runs longer than this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Wait for each cell before starting the next
    #[arg(long)]
    sequential: bool,
}

impl SessionArgs {
    fn into_options(self, cell: Option<usize>) -> RunOptions {
        let session = match self.interpreter {
            Some(program) => SessionConfig::with_program(program),
            None => SessionConfig::node(),
        };
        RunOptions {
            cell,
            sequential: self.sequential,
            session: session.with_timeout(self.timeout.map(Duration::from_secs)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a notebook headlessly
    Run {
        /// Path to the notebook (.jsnb file)
        notebook: String,

        /// Run only a specific cell (1-based)
        #[arg(long)]
        cell: Option<usize>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Watch notebook and re-run on changes
    Watch {
        /// Path to the notebook (.jsnb file)
        notebook: String,

        #[command(flatten)]
        session: SessionArgs,

        /// Clear screen before each run
        #[arg(long)]
        clear: bool,
    },

    /// List the cells of a notebook
    Cells {
        /// Path to the notebook (.jsnb file)
        notebook: String,
    },

    /// Normalize the cell layout of a notebook
    Fmt {
        /// Path to the notebook (.jsnb file)
        notebook: String,

        /// Only check, exit with an error if the file would change
        #[arg(long)]
        check: bool,
    },

    /// Create a new notebook from template
    New {
        /// Name of the notebook (without .jsnb extension)
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format cellpad-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<cellpad_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            notebook,
            cell,
            session,
        } => {
            run::execute(&notebook, session.into_options(cell))
                .await
                .map_err(format_error)?;
        }

        Commands::Watch {
            notebook,
            session,
            clear,
        } => {
            watch::execute(&notebook, session.into_options(None), clear)
                .await
                .map_err(format_error)?;
        }

        Commands::Cells { notebook } => {
            cells::execute(&notebook).await.map_err(format_error)?;
        }

        Commands::Fmt { notebook, check } => {
            fmt::execute(&notebook, check).await.map_err(format_error)?;
        }

        Commands::New { name } => {
            create_new_notebook(&name).await.map_err(format_error)?;
        }
    }

    Ok(())
}

/// Create a new notebook from template.
async fn create_new_notebook(name: &str) -> anyhow::Result<()> {
    let path = notebook_path(name);
    if path.exists() {
        anyhow::bail!("File {} already exists", path.display());
    }

    let title = path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let document = Document::new(
        &path,
        vec![
            Cell::new(format!(
                "// # {title}\n//\n// A Cellpad notebook. Cells share one interpreter,\n// so declarations carry over from cell to cell."
            )),
            Cell::new("const greeting = 'Hello from Cellpad!';\ngreeting"),
            Cell::new("greeting.toUpperCase()"),
        ],
    );

    ContentProvider::new().save(&document).await?;
    println!("Created new notebook: {}", path.display());
    Ok(())
}
