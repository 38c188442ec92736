//! Watch command implementation for Cellpad CLI.
//!
//! Re-runs a notebook every time its file changes. Each run gets a fresh
//! interpreter, so state never leaks between edits.

use crate::colors;
use crate::executor::{RunOptions, resolve_notebook, run_notebook};
use crate::watcher::{FileEvent, FileWatcher};

/// Execute the watch command.
pub async fn execute(
    notebook_path: &str,
    options: RunOptions,
    clear_screen: bool,
) -> anyhow::Result<()> {
    let abs_path = resolve_notebook(notebook_path)?;

    println!(
        "\n{}Cellpad Watch{} - {}{}{}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        abs_path.display(),
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    if clear_screen {
        clear_terminal();
    }
    if let Err(e) = run_notebook(&abs_path, &options).await {
        eprintln!("{}Error:{} {}", colors::RED, colors::RESET, e);
    }
    print_watch_status();

    let mut watcher = FileWatcher::new(&abs_path)?;

    loop {
        let event = tokio::select! {
            event = watcher.recv() => event,
            _ = tokio::signal::ctrl_c() => break,
        };

        match event {
            Some(FileEvent::Modified(_)) => {
                println!(
                    "\n{}File changed, re-running...{}",
                    colors::YELLOW,
                    colors::RESET
                );
                if clear_screen {
                    clear_terminal();
                }
                if let Err(e) = run_notebook(&abs_path, &options).await {
                    eprintln!("{}Error:{} {}", colors::RED, colors::RESET, e);
                }
                print_watch_status();
            }
            Some(FileEvent::Removed(path)) => {
                eprintln!(
                    "\n{}Warning:{} Notebook file removed: {}",
                    colors::YELLOW,
                    colors::RESET,
                    path.display()
                );
            }
            None => break,
        }
    }

    Ok(())
}

/// Clear the terminal screen.
fn clear_terminal() {
    print!("\x1B[2J\x1B[1;1H");
    colors::flush_stdout();
}

fn print_watch_status() {
    println!(
        "\n{}Watching for changes... (Ctrl+C to stop){}",
        colors::DIM,
        colors::RESET
    );
}
