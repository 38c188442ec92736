//! Notebook cells and their run-state metadata.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::output::CellOutput;

static NEXT_CELL_ID: AtomicUsize = AtomicUsize::new(1);

/// Process-unique cell identifier.
///
/// Ids are never reused, so a cell keeps its identity while the
/// document around it is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(usize);

impl CellId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell_{}", self.0)
    }
}

/// Cell execution status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Cell has not been executed (or its last run was cancelled).
    #[default]
    Idle,
    /// Cell is currently executing.
    Running,
    /// Cell completed successfully.
    Success,
    /// Cell failed with an error.
    Error,
}

/// Per-cell execution metadata. Kept in memory only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellMetadata {
    /// Current execution status.
    pub run_state: RunState,
    /// Wall-clock time the last run started.
    pub run_start_time: Option<SystemTime>,
    /// Duration of the last successful run.
    pub last_run_duration: Option<Duration>,
}

/// Point-in-time copy of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSnapshot {
    pub id: CellId,
    pub source: String,
    pub metadata: CellMetadata,
    pub outputs: Vec<CellOutput>,
}

#[derive(Debug, Default)]
struct CellData {
    source: String,
    metadata: CellMetadata,
    outputs: Vec<CellOutput>,
}

/// A single code cell.
///
/// Cells are shared between the host and running executions, so all
/// state sits behind a lock. Run-state transitions are applied in one
/// critical section each, which keeps these invariants observable at
/// all times:
///
/// - `Running` has a start time and no outputs.
/// - `Success` and `Error` have a start time and exactly one output.
/// - `last_run_duration` is only set after a `Success`.
#[derive(Debug)]
pub struct Cell {
    id: CellId,
    data: Mutex<CellData>,
}

impl Cell {
    /// Create an idle cell with the given source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: CellId::next(),
            data: Mutex::new(CellData {
                source: source.into(),
                ..Default::default()
            }),
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    /// Current source text.
    pub fn source(&self) -> String {
        self.lock().source.clone()
    }

    /// Replace the source text. Outputs and metadata are left untouched.
    pub fn set_source(&self, source: impl Into<String>) {
        self.lock().source = source.into();
    }

    pub fn run_state(&self) -> RunState {
        self.lock().metadata.run_state
    }

    pub fn metadata(&self) -> CellMetadata {
        self.lock().metadata.clone()
    }

    pub fn outputs(&self) -> Vec<CellOutput> {
        self.lock().outputs.clone()
    }

    pub fn snapshot(&self) -> CellSnapshot {
        let data = self.lock();
        CellSnapshot {
            id: self.id,
            source: data.source.clone(),
            metadata: data.metadata.clone(),
            outputs: data.outputs.clone(),
        }
    }

    /// Enter `Running` and return the source to execute.
    ///
    /// The source is read in the same critical section as the transition
    /// so the executed code always matches the run that was recorded.
    pub(crate) fn begin_run(&self, started: SystemTime) -> String {
        let mut data = self.lock();
        data.outputs.clear();
        data.metadata = CellMetadata {
            run_state: RunState::Running,
            run_start_time: Some(started),
            last_run_duration: None,
        };
        data.source.clone()
    }

    /// Record a successful run.
    pub(crate) fn complete(&self, output: CellOutput, duration: Duration) {
        let mut data = self.lock();
        data.outputs = vec![output];
        data.metadata.run_state = RunState::Success;
        data.metadata.last_run_duration = Some(duration);
    }

    /// Record a failed run.
    pub(crate) fn fail(&self, output: CellOutput) {
        let mut data = self.lock();
        data.outputs = vec![output];
        data.metadata.run_state = RunState::Error;
        data.metadata.last_run_duration = None;
    }

    /// Drop all run state, returning the cell to `Idle`.
    pub(crate) fn reset(&self) {
        let mut data = self.lock();
        data.outputs.clear();
        data.metadata = CellMetadata::default();
    }

    fn lock(&self) -> MutexGuard<'_, CellData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
