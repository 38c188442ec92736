//! File watcher for detecting notebook changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cellpad_sync::NOTEBOOK_EXTENSION;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer, notify::RecursiveMode};
use tokio::sync::mpsc;

/// File change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// File was modified or recreated.
    Modified(PathBuf),
    /// File was removed.
    Removed(PathBuf),
}

/// Watches one notebook file.
pub struct FileWatcher {
    /// Debouncer handle (kept alive to maintain watcher).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    /// Receiver for file events.
    rx: mpsc::UnboundedReceiver<FileEvent>,
}

impl FileWatcher {
    /// Create a new file watcher for the notebook at `path`.
    ///
    /// The parent directory is watched so that editors which save by
    /// replacing the file are still seen.
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let target = path.as_ref().to_path_buf();
        let watch_path = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(
            Duration::from_millis(200),
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        if !is_target(&event.path, &target) {
                            continue;
                        }
                        let file_event = if event.path.exists() {
                            FileEvent::Modified(event.path)
                        } else {
                            FileEvent::Removed(event.path)
                        };
                        let _ = tx.send(file_event);
                    }
                }
                Err(e) => tracing::warn!("File watch error: {}", e),
            },
        )
        .map_err(|e| anyhow::anyhow!("Failed to create file watcher: {}", e))?;

        debouncer
            .watcher()
            .watch(&watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow::anyhow!("Failed to watch {}: {}", watch_path.display(), e))?;

        Ok(Self {
            _debouncer: debouncer,
            rx,
        })
    }

    /// Receive the next file event.
    pub async fn recv(&mut self) -> Option<FileEvent> {
        self.rx.recv().await
    }
}

fn is_target(event_path: &Path, target: &Path) -> bool {
    if event_path
        .extension()
        .is_none_or(|ext| ext != NOTEBOOK_EXTENSION)
    {
        return false;
    }
    event_path == target
        || event_path
            .canonicalize()
            .is_ok_and(|canonical| canonical == target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp = TempDir::new().unwrap();
        let notebook = temp.path().join("test.jsnb");
        fs::write(&notebook, "1").unwrap();

        let watcher = FileWatcher::new(&notebook);
        assert!(watcher.is_ok());
    }

    #[test]
    fn test_only_target_notebook_matches() {
        let target = Path::new("/notes/demo.jsnb");
        assert!(is_target(Path::new("/notes/demo.jsnb"), target));
        assert!(!is_target(Path::new("/notes/other.jsnb"), target));
        assert!(!is_target(Path::new("/notes/demo.js"), target));
    }
}
