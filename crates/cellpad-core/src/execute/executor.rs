//! Cell executor.
//!
//! Runs cells of one document against that document's session and keeps
//! each cell's run state, timing, and outputs in step with the result.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;
use std::time::{Instant, SystemTime};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::session::{ExecutionError, Session};
use crate::state::{Cell, CellId, CellOutput, Document, RunState};

use super::context::{ExecutionCallback, RunRegistry};

/// Executes cells against a single session.
///
/// Transitions per run:
///
/// ```text
/// any ──► Running ──┬── value ─────► Success  (one Rich output, duration)
///                   ├── error ─────► Error    (one Error output, no duration)
///                   └── cancelled ─► Idle     (no output)
/// ```
///
/// A cell can only be claimed by one run at a time; asking to run a cell
/// that is already queued or running fails with
/// [`Error::ExecutionInProgress`](crate::Error::ExecutionInProgress).
pub struct CellExecutor {
    /// Session the cells run in.
    session: Arc<dyn Session>,
    /// Execution callback for progress reporting.
    callback: Option<Arc<dyn ExecutionCallback>>,
    /// Claimed runs and their cancellation tokens.
    runs: Arc<RunRegistry>,
}

impl CellExecutor {
    /// Create an executor for `session`.
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self {
            session,
            callback: None,
            runs: Arc::new(RunRegistry::default()),
        }
    }

    /// Set the execution callback for progress reporting.
    pub fn with_callback(mut self, callback: Arc<dyn ExecutionCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Execute one cell and wait for it to settle.
    ///
    /// Dropping the returned future abandons the run and puts the cell back
    /// to `Idle`.
    pub async fn execute_cell(&self, cell: &Cell) -> Result<RunState> {
        let slot = self.runs.claim(cell.id())?;
        Ok(self.run(cell, slot.token(), None).await)
    }

    /// Start every cell of `document`, in document order, without waiting.
    ///
    /// All cells are claimed before this returns, so they can be cancelled
    /// immediately. Requests reach the session in document order, but
    /// completions may arrive in any order and each cell updates as soon as
    /// its own result is in. Dropping the handles does not stop the runs.
    ///
    /// Each run waits until the run before it has taken its place in the
    /// session queue, so the order holds however the runtime schedules the
    /// spawned tasks.
    pub fn execute_all_cells(self: &Arc<Self>, document: &Document) -> Vec<JoinHandle<Result<RunState>>> {
        let mut previous: Option<oneshot::Receiver<()>> = None;

        document
            .cells()
            .into_iter()
            .map(|cell| {
                let claim = self.runs.claim(cell.id());
                let (queued, next) = oneshot::channel();
                let after = previous.replace(next);
                let executor = self.clone();

                tokio::spawn(async move {
                    let slot = claim?;
                    if let Some(after) = after {
                        // A dropped sender means the previous run never got
                        // that far, which frees this one too.
                        tokio::select! {
                            biased;
                            _ = slot.token().cancelled() => {}
                            _ = after => {}
                        }
                    }
                    Ok(executor.run(&cell, slot.token(), Some(queued)).await)
                })
            })
            .collect()
    }

    /// Execute every cell of `document` top to bottom, each after the
    /// previous one settled.
    ///
    /// An error in one cell does not stop the cells after it.
    pub async fn execute_all_cells_sequential(&self, document: &Document) -> Vec<Result<RunState>> {
        let cells = document.cells();
        let claims: Vec<_> = cells.iter().map(|cell| self.runs.claim(cell.id())).collect();

        let mut results = Vec::with_capacity(cells.len());
        for (cell, claim) in cells.iter().zip(claims) {
            results.push(match claim {
                Ok(slot) => Ok(self.run(cell, slot.token(), None).await),
                Err(e) => Err(e),
            });
        }
        results
    }

    /// Cancel the queued or running execution of `cell`.
    ///
    /// Returns whether there was one to cancel.
    pub fn cancel_cell_execution(&self, cell: &Cell) -> bool {
        self.runs.cancel(cell.id())
    }

    /// Cancel every queued or running execution. Returns how many were signalled.
    pub fn cancel_all_cells_execution(&self) -> usize {
        self.runs.cancel_all()
    }

    /// Whether `cell_id` is queued or running here.
    pub fn is_executing(&self, cell_id: CellId) -> bool {
        self.runs.is_claimed(cell_id)
    }

    /// Number of queued or running executions.
    pub fn running_count(&self) -> usize {
        self.runs.len()
    }

    /// Run `cell` to completion. `queued` fires once the call holds its
    /// place in the session queue.
    async fn run(
        &self,
        cell: &Cell,
        cancel: &CancellationToken,
        queued: Option<oneshot::Sender<()>>,
    ) -> RunState {
        let cell_id = cell.id();
        let code = cell.begin_run(SystemTime::now());
        let guard = RunGuard::new(cell);
        let start = Instant::now();

        tracing::debug!("Executing {}", cell_id);
        if let Some(ref callback) = self.callback {
            callback.on_cell_started(cell_id);
        }

        let mut call = self.session.execute_cancellable(&code, cancel);
        let first = poll_once(&mut call).await;
        if let Some(queued) = queued {
            let _ = queued.send(());
        }
        let result = match first {
            Poll::Ready(result) => result,
            Poll::Pending => call.await,
        };
        guard.disarm();

        match result {
            Ok(output) => {
                let duration = start.elapsed();
                cell.complete(CellOutput::Rich { data: output.mime }, duration);
                tracing::debug!("{} completed in {:?}", cell_id, duration);
                if let Some(ref callback) = self.callback {
                    callback.on_cell_completed(cell_id, duration);
                }
                RunState::Success
            }
            Err(e) => {
                if let ExecutionError::Kernel(ref kernel) = e {
                    tracing::warn!("{} failed in the kernel: {}", cell_id, kernel);
                }
                match e.to_output() {
                    Some(output) => {
                        cell.fail(output.clone());
                        if let Some(ref callback) = self.callback {
                            callback.on_cell_error(cell_id, &output);
                        }
                        RunState::Error
                    }
                    None => {
                        cell.reset();
                        tracing::debug!("{} cancelled", cell_id);
                        if let Some(ref callback) = self.callback {
                            callback.on_cell_cancelled(cell_id);
                        }
                        RunState::Idle
                    }
                }
            }
        }
    }
}

/// Poll `call` a single time.
///
/// A session takes a call's place in its queue on the first poll, so once
/// this returns the call is ordered against every later one.
async fn poll_once<F: Future + Unpin>(call: &mut F) -> Poll<F::Output> {
    std::future::poll_fn(|cx| Poll::Ready(Pin::new(&mut *call).poll(cx))).await
}

/// Puts a cell back to `Idle` if its run is dropped before it settles.
struct RunGuard<'a> {
    cell: Option<&'a Cell>,
}

impl<'a> RunGuard<'a> {
    fn new(cell: &'a Cell) -> Self {
        Self { cell: Some(cell) }
    }

    fn disarm(mut self) {
        self.cell = None;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell {
            tracing::debug!("{} abandoned while running", cell.id());
            cell.reset();
        }
    }
}
