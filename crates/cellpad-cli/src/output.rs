//! Cell output formatting for terminal display.

use cellpad_core::{CellOutput, CellSnapshot, RunState, TEXT_PLAIN};

use crate::colors;

/// Print a cell's state and output.
///
/// `number` is the 1-based position shown to the user.
pub fn print_output(number: usize, cell: &CellSnapshot) {
    let timing = cell
        .metadata
        .last_run_duration
        .map(|d| format!(" {}", format_duration(d.as_secs_f64())))
        .unwrap_or_default();
    println!(
        "\n{}[{}]{} {}{}{}{}",
        colors::CYAN,
        number,
        colors::RESET,
        colors::DIM,
        state_label(cell.metadata.run_state),
        timing,
        colors::RESET
    );

    for output in &cell.outputs {
        match output {
            CellOutput::Rich { data } => match data.get(TEXT_PLAIN) {
                Some(value) => {
                    let text = value
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string());
                    for line in text.lines() {
                        println!("  {}", line);
                    }
                }
                None => {
                    let types: Vec<&str> = data.keys().map(String::as_str).collect();
                    println!(
                        "  {}[{}]{}",
                        colors::DIM,
                        types.join(", "),
                        colors::RESET
                    );
                }
            },
            CellOutput::Error {
                name,
                message,
                trace,
            } => {
                println!("  {}{}:{} {}", colors::RED, name, colors::RESET, message);
                for line in trace.lines().filter(|l| !l.trim().is_empty()) {
                    println!("  {}{}{}", colors::DIM, line, colors::RESET);
                }
            }
        }
    }
}

fn state_label(state: RunState) -> &'static str {
    match state {
        RunState::Idle => "not run",
        RunState::Running => "running",
        RunState::Success => "ok",
        RunState::Error => "error",
    }
}

/// Format seconds for display: milliseconds below one second.
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else {
        format!("{:.2}s", secs)
    }
}
