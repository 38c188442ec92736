//! Session configuration.
//!
//! Decides which interpreter backs a session and how long a single
//! request may take.

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the interpreter binary.
pub const INTERPRETER_ENV: &str = "CELLPAD_INTERPRETER";

/// Language every cell of a notebook is written in.
pub const DEFAULT_LANGUAGE: &str = "javascript";

/// Evaluation loop run inside the default interpreter.
pub const BOOTSTRAP_SCRIPT: &str = include_str!("ipc/bootstrap.js");

/// Configuration for interpreter-backed sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interpreter binary.
    pub program: PathBuf,
    /// Arguments passed to the interpreter.
    pub args: Vec<String>,
    /// Maximum time a single request may take. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl SessionConfig {
    /// Node.js running the bundled evaluation loop.
    ///
    /// The binary is looked up in the following order:
    /// 1. `CELLPAD_INTERPRETER` environment variable
    /// 2. `node` on the system PATH
    pub fn node() -> Self {
        Self::with_program(Self::find_node())
    }

    /// A Node-compatible binary at `program` running the bundled loop.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-e".to_string(), BOOTSTRAP_SCRIPT.to_string()],
            timeout: None,
        }
    }

    /// A custom interpreter that speaks the session protocol itself.
    pub fn custom(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn find_node() -> PathBuf {
        if let Ok(path) = std::env::var(INTERPRETER_ENV)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }

        // Falls back to the bare name; spawning reports a clear error if it is missing.
        which::which("node").unwrap_or_else(|_| PathBuf::from("node"))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::node()
    }
}
