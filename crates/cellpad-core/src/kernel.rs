//! Kernel provider: one executor and session per open document.
//!
//! Documents are keyed by path. The provider holds documents weakly, so a
//! document the host has dropped loses its kernel on the next access, and
//! hosts that do get a close notification can evict explicitly with
//! [`KernelProvider::close_document`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::execute::{CellExecutor, ExecutionCallback};
use crate::session::{ProcessSession, Session};
use crate::state::{Cell, Document, RunState};

/// Creates the session for a newly seen document.
pub trait SessionFactory: Send + Sync {
    /// Create a session running in `working_dir`.
    fn create_session(&self, working_dir: &Path) -> Arc<dyn Session>;
}

impl<F> SessionFactory for F
where
    F: Fn(&Path) -> Arc<dyn Session> + Send + Sync,
{
    fn create_session(&self, working_dir: &Path) -> Arc<dyn Session> {
        self(working_dir)
    }
}

/// Factory for interpreter-backed sessions.
#[derive(Debug, Clone, Default)]
pub struct ProcessSessionFactory {
    config: SessionConfig,
}

impl ProcessSessionFactory {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }
}

impl SessionFactory for ProcessSessionFactory {
    fn create_session(&self, working_dir: &Path) -> Arc<dyn Session> {
        Arc::new(ProcessSession::new(working_dir, self.config.clone()))
    }
}

/// A kernel and every open document instance that shares it.
struct KernelEntry {
    documents: Vec<Weak<Document>>,
    executor: Arc<CellExecutor>,
}

impl KernelEntry {
    fn track(&mut self, document: &Arc<Document>) {
        if !self
            .documents
            .iter()
            .any(|known| std::ptr::eq(known.as_ptr(), Arc::as_ptr(document)))
        {
            self.documents.push(Arc::downgrade(document));
        }
    }

    /// Forget dropped documents; false once none is left.
    fn retain_live(&mut self) -> bool {
        self.documents.retain(|document| document.strong_count() > 0);
        !self.documents.is_empty()
    }
}

/// Maps open documents to their kernels.
///
/// Constructed by the host and passed to whatever needs it; there is no
/// process-wide instance.
pub struct KernelProvider {
    factory: Box<dyn SessionFactory>,
    callback: Option<Arc<dyn ExecutionCallback>>,
    kernels: Mutex<FxHashMap<PathBuf, KernelEntry>>,
}

impl KernelProvider {
    /// Create a provider that builds sessions with `factory`.
    pub fn new(factory: impl SessionFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            callback: None,
            kernels: Mutex::new(FxHashMap::default()),
        }
    }

    /// Create a provider of interpreter-backed sessions.
    pub fn with_config(config: SessionConfig) -> Self {
        Self::new(ProcessSessionFactory::new(config))
    }

    /// Report progress of every kernel created from now on to `callback`.
    pub fn with_callback(mut self, callback: impl ExecutionCallback + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Kernel for `document`, created on first use.
    ///
    /// Idempotent per document path. The new session runs in the
    /// document's directory. Document instances sharing a path share the
    /// kernel, which lives until the last of them is dropped.
    pub fn provide_kernel(&self, document: &Arc<Document>) -> Arc<CellExecutor> {
        let mut kernels = self.lock();
        Self::prune(&mut kernels);

        if let Some(entry) = kernels.get_mut(document.path()) {
            entry.track(document);
            return entry.executor.clone();
        }

        let session = self.factory.create_session(document.working_dir());
        let mut executor = CellExecutor::new(session);
        if let Some(ref callback) = self.callback {
            executor = executor.with_callback(callback.clone());
        }
        let executor = Arc::new(executor);

        tracing::debug!(
            "Created kernel for {} in {}",
            document.path().display(),
            document.working_dir().display()
        );
        kernels.insert(
            document.path().to_path_buf(),
            KernelEntry {
                documents: vec![Arc::downgrade(document)],
                executor: executor.clone(),
            },
        );
        executor
    }

    /// Session for `document`, created on first use.
    pub fn provide_session(&self, document: &Arc<Document>) -> Arc<dyn Session> {
        self.provide_kernel(document).session().clone()
    }

    /// Existing kernel for the document at `path`, without creating one.
    pub fn kernel_for(&self, path: &Path) -> Option<Arc<CellExecutor>> {
        let mut kernels = self.lock();
        Self::prune(&mut kernels);
        kernels.get(path).map(|entry| entry.executor.clone())
    }

    /// Forget the kernel of the document at `path`, cancelling its runs.
    ///
    /// Returns the evicted kernel so the caller can shut its session down.
    pub fn close_document(&self, path: &Path) -> Option<Arc<CellExecutor>> {
        let entry = self.lock().remove(path)?;
        let cancelled = entry.executor.cancel_all_cells_execution();
        tracing::debug!(
            "Closed kernel for {} ({} runs cancelled)",
            path.display(),
            cancelled
        );
        Some(entry.executor)
    }

    /// Number of live kernels.
    pub fn len(&self) -> usize {
        let mut kernels = self.lock();
        Self::prune(&mut kernels);
        kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execute one cell of `document`.
    pub async fn execute_cell(&self, document: &Arc<Document>, cell: &Cell) -> Result<RunState> {
        self.provide_kernel(document).execute_cell(cell).await
    }

    /// Start every cell of `document` without waiting. See
    /// [`CellExecutor::execute_all_cells`].
    pub fn execute_all_cells(&self, document: &Arc<Document>) -> Vec<JoinHandle<Result<RunState>>> {
        self.provide_kernel(document).execute_all_cells(document)
    }

    /// Cancel the execution of `cell`. Never creates a kernel.
    pub fn cancel_cell_execution(&self, document: &Document, cell: &Cell) -> bool {
        self.kernel_for(document.path())
            .is_some_and(|kernel| kernel.cancel_cell_execution(cell))
    }

    /// Cancel every execution in `document`. Never creates a kernel.
    pub fn cancel_all_cells_execution(&self, document: &Document) -> usize {
        self.kernel_for(document.path())
            .map_or(0, |kernel| kernel.cancel_all_cells_execution())
    }

    fn prune(kernels: &mut FxHashMap<PathBuf, KernelEntry>) {
        kernels.retain(|path, entry| {
            let alive = entry.retain_live();
            if !alive {
                tracing::debug!("Dropping kernel for closed document {}", path.display());
            }
            alive
        });
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<PathBuf, KernelEntry>> {
        self.kernels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for KernelProvider {
    fn default() -> Self {
        Self::with_config(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_factory_scopes_to_document_dir() {
        let factory = ProcessSessionFactory::new(SessionConfig::custom("node", Vec::new()));
        let session = factory.create_session(Path::new("/notebooks/reports"));
        assert_eq!(session.working_dir(), Path::new("/notebooks/reports"));
    }

    #[test]
    fn test_provider_without_kernels() {
        let provider = KernelProvider::with_config(SessionConfig::custom("node", Vec::new()));
        assert!(provider.is_empty());
        assert!(provider.kernel_for(Path::new("/missing.jsnb")).is_none());
        assert!(provider.close_document(Path::new("/missing.jsnb")).is_none());
    }
}
