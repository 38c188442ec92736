//! Notebook documents.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};

use super::cell::{Cell, CellId};

/// An open notebook: an ordered list of cells identified by its path.
///
/// Documents are shared as `Arc<Document>`; the kernel provider only
/// keeps a weak reference, so dropping the last strong reference lets
/// the document's session be reclaimed.
#[derive(Debug)]
pub struct Document {
    path: PathBuf,
    cells: RwLock<Vec<Arc<Cell>>>,
}

impl Document {
    /// Create a document from decoded cells.
    pub fn new(path: impl Into<PathBuf>, cells: Vec<Cell>) -> Self {
        Self {
            path: path.into(),
            cells: RwLock::new(cells.into_iter().map(Arc::new).collect()),
        }
    }

    /// Storage location; also the document's identity.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the document lives in. Sessions run here.
    pub fn working_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// All cells in document order.
    pub fn cells(&self) -> Vec<Arc<Cell>> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Cell at `index`, if any.
    pub fn cell(&self, index: usize) -> Option<Arc<Cell>> {
        self.read().get(index).cloned()
    }

    /// Look a cell up by id.
    pub fn find_cell(&self, id: CellId) -> Option<Arc<Cell>> {
        self.read().iter().find(|c| c.id() == id).cloned()
    }

    /// Position of a cell in the document.
    pub fn index_of(&self, id: CellId) -> Option<usize> {
        self.read().iter().position(|c| c.id() == id)
    }

    /// Source text of every cell, in order.
    pub fn sources(&self) -> Vec<String> {
        self.read().iter().map(|c| c.source()).collect()
    }

    /// Append a new cell.
    pub fn push_cell(&self, source: impl Into<String>) -> Arc<Cell> {
        let cell = Arc::new(Cell::new(source));
        self.write().push(cell.clone());
        cell
    }

    /// Insert a new cell at `index`.
    pub fn insert_cell(&self, index: usize, source: impl Into<String>) -> Result<Arc<Cell>> {
        let mut cells = self.write();
        if index > cells.len() {
            return Err(Error::InvalidOperation(format!(
                "cannot insert at {} in a document of {} cells",
                index,
                cells.len()
            )));
        }
        let cell = Arc::new(Cell::new(source));
        cells.insert(index, cell.clone());
        Ok(cell)
    }

    /// Remove a cell by id.
    pub fn remove_cell(&self, id: CellId) -> Result<Arc<Cell>> {
        let mut cells = self.write();
        let index = cells
            .iter()
            .position(|c| c.id() == id)
            .ok_or(Error::CellNotFound(id))?;
        Ok(cells.remove(index))
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Cell>>> {
        self.cells.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Cell>>> {
        self.cells.write().unwrap_or_else(PoisonError::into_inner)
    }
}
