//! Execution callbacks and run bookkeeping.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::state::{CellId, CellOutput};

/// Callback trait for execution progress reporting.
pub trait ExecutionCallback: Send + Sync {
    /// Called when a cell starts executing.
    fn on_cell_started(&self, cell_id: CellId);

    /// Called when a cell completes successfully.
    fn on_cell_completed(&self, cell_id: CellId, duration: Duration);

    /// Called when a cell execution fails.
    fn on_cell_error(&self, cell_id: CellId, output: &CellOutput);

    /// Called when a cell execution is cancelled.
    fn on_cell_cancelled(&self, _cell_id: CellId) {}
}

/// Cells claimed for execution, each with the token that cancels it.
#[derive(Default)]
pub(crate) struct RunRegistry {
    running: Mutex<FxHashMap<CellId, CancellationToken>>,
}

impl RunRegistry {
    /// Claim `cell_id` for one run.
    ///
    /// Fails if the cell is already claimed. The claim is released when
    /// the returned slot is dropped, including when the run's future is.
    pub(crate) fn claim(self: &Arc<Self>, cell_id: CellId) -> Result<RunSlot> {
        let mut running = self.lock();
        if running.contains_key(&cell_id) {
            return Err(Error::ExecutionInProgress(cell_id));
        }
        let token = CancellationToken::new();
        running.insert(cell_id, token.clone());
        Ok(RunSlot {
            registry: self.clone(),
            cell_id,
            token,
        })
    }

    /// Signal the run of `cell_id`, if there is one.
    pub(crate) fn cancel(&self, cell_id: CellId) -> bool {
        match self.lock().get(&cell_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Signal every claimed run. Returns how many were signalled.
    pub(crate) fn cancel_all(&self) -> usize {
        let running = self.lock();
        for token in running.values() {
            token.cancel();
        }
        running.len()
    }

    pub(crate) fn is_claimed(&self, cell_id: CellId) -> bool {
        self.lock().contains_key(&cell_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<CellId, CancellationToken>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A claimed run. Dropping it releases the claim.
pub(crate) struct RunSlot {
    registry: Arc<RunRegistry>,
    cell_id: CellId,
    token: CancellationToken,
}

impl RunSlot {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.cell_id);
    }
}
