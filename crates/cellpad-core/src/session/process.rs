//! Process-backed session.
//!
//! Runs cells in one long-lived interpreter process per document. The
//! process is started on the first call and restarted on demand after it
//! dies, is killed by a cancellation, or times out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::ipc::{InterpreterHandle, ReplyOutcome};

use super::{ExecutionError, ExecutionOutput, ExecutionResult, Session};

/// Session backed by an interpreter process.
///
/// The interpreter answers one request at a time. Callers queue on a fair
/// mutex, so requests are sent and resolved in arrival order and an
/// exchange is never interleaved with another caller's. A call joins the
/// queue on the first poll of its future.
///
/// Cancelling a queued call removes it from the queue. Cancelling the call
/// in flight kills the interpreter, because there is no other way to stop
/// code that is already running; the next call starts a fresh one.
pub struct ProcessSession {
    /// Directory the interpreter runs in.
    working_dir: PathBuf,
    /// Interpreter settings.
    config: SessionConfig,
    /// Running interpreter, if any. Held for a whole exchange.
    interpreter: Mutex<Option<InterpreterHandle>>,
}

/// How an in-flight exchange ended.
enum Settled {
    Reply(Result<ReplyOutcome>),
    Cancelled,
    TimedOut(Duration),
}

impl ProcessSession {
    /// Create a session. No process is started until the first call.
    pub fn new(working_dir: impl Into<PathBuf>, config: SessionConfig) -> Self {
        Self {
            working_dir: working_dir.into(),
            config,
            interpreter: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether an interpreter process is currently alive.
    pub async fn is_running(&self) -> bool {
        self.interpreter
            .lock()
            .await
            .as_mut()
            .is_some_and(|handle| handle.is_alive())
    }

    /// Kill the interpreter, dropping all session state.
    ///
    /// Waits for the call in flight (if any) to finish first.
    pub async fn restart(&self) -> Result<()> {
        let mut guard = self.interpreter.lock().await;
        Self::discard(&mut guard).await;
        Ok(())
    }

    async fn run(&self, code: &str, cancel: Option<&CancellationToken>) -> ExecutionResult {
        let mut guard = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ExecutionError::Cancelled),
                guard = self.interpreter.lock() => guard,
            },
            None => self.interpreter.lock().await,
        };

        // A cancellation that raced the lock still wins.
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return Err(ExecutionError::Cancelled);
        }

        let alive = guard.as_mut().is_some_and(|handle| handle.is_alive());
        if !alive {
            if guard.is_some() {
                tracing::warn!(
                    "Interpreter for {} exited, starting a new one",
                    self.working_dir.display()
                );
            }
            *guard = Some(InterpreterHandle::spawn(&self.config, &self.working_dir)?);
        }
        let Some(handle) = guard.as_mut() else {
            return Err(Error::Ipc("Interpreter unavailable".to_string()).into());
        };

        let settled = tokio::select! {
            biased;
            _ = cancelled(cancel) => Settled::Cancelled,
            limit = expired(self.config.timeout) => Settled::TimedOut(limit),
            reply = handle.evaluate(code) => Settled::Reply(reply),
        };

        match settled {
            Settled::Reply(Ok(ReplyOutcome::Ok(mime))) => Ok(ExecutionOutput { mime }),
            Settled::Reply(Ok(ReplyOutcome::Error(raised))) => Err(ExecutionError::Raised(raised)),
            Settled::Reply(Err(e)) => {
                // The stream is in an unknown state; never reuse it.
                Self::discard(&mut guard).await;
                Err(ExecutionError::Kernel(e))
            }
            Settled::Cancelled => {
                tracing::info!("Execution cancelled, killing interpreter");
                Self::discard(&mut guard).await;
                Err(ExecutionError::Cancelled)
            }
            Settled::TimedOut(limit) => {
                tracing::warn!("Execution timed out after {:?}, killing interpreter", limit);
                Self::discard(&mut guard).await;
                Err(ExecutionError::Kernel(Error::Timeout(limit)))
            }
        }
    }

    async fn discard(guard: &mut MutexGuard<'_, Option<InterpreterHandle>>) {
        if let Some(mut handle) = guard.take()
            && let Err(e) = handle.kill().await
        {
            tracing::warn!("Failed to stop interpreter: {}", e);
        }
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn expired(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}

#[async_trait]
impl Session for ProcessSession {
    async fn execute(&self, code: &str) -> ExecutionResult {
        self.run(code, None).await
    }

    async fn execute_cancellable(&self, code: &str, cancel: &CancellationToken) -> ExecutionResult {
        self.run(code, Some(cancel)).await
    }

    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    async fn shutdown(&self) -> Result<()> {
        let mut guard = self.interpreter.lock().await;
        match guard.take() {
            Some(handle) => handle.shutdown().await,
            None => Ok(()),
        }
    }
}
