//! Content provider: notebook files in and out of storage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cellpad_core::config::DEFAULT_LANGUAGE;
use cellpad_core::{Cell, Document};

use crate::codec;
use crate::error::{SyncError, SyncResult};

/// Where an opened notebook's content came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotebookMetadata {
    /// Backup the content was recovered from, if any.
    pub recovered_from: Option<PathBuf>,
    /// Whether the file contained invalid UTF-8 that was replaced.
    pub lossy: bool,
}

/// A decoded notebook, ready to become a [`Document`].
#[derive(Debug)]
pub struct NotebookData {
    /// Languages the cells are written in.
    pub languages: Vec<String>,
    pub metadata: NotebookMetadata,
    pub cells: Vec<Cell>,
}

impl NotebookData {
    /// Turn the data into a document stored at `path`.
    pub fn into_document(self, path: impl Into<PathBuf>) -> Arc<Document> {
        Arc::new(Document::new(path, self.cells))
    }
}

/// A crash-recovery copy of a notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Identifier to hand back to [`ContentProvider::open_with_backup`].
    pub id: String,
    pub path: PathBuf,
}

impl Backup {
    /// Remove the backup file. Removing a backup that is already gone succeeds.
    pub async fn delete(&self) -> SyncResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Deleted backup {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SyncError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Reads and writes notebooks through the delimiter codec.
///
/// I/O errors are returned as-is (wrapped with the path); nothing is
/// retried.
#[derive(Debug, Clone)]
pub struct ContentProvider {
    language: String,
}

impl ContentProvider {
    /// Create a provider for JavaScript notebooks.
    pub fn new() -> Self {
        Self::with_language(DEFAULT_LANGUAGE)
    }

    /// Create a provider whose notebooks are written in `language`.
    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Read and decode the notebook at `path`.
    pub async fn open(&self, path: impl AsRef<Path>) -> SyncResult<NotebookData> {
        self.open_with_backup(path, None).await
    }

    /// Read and decode a notebook, preferring the backup `backup_id` when
    /// one is given.
    pub async fn open_with_backup(
        &self,
        path: impl AsRef<Path>,
        backup_id: Option<&str>,
    ) -> SyncResult<NotebookData> {
        let path = path.as_ref();
        let (source_path, recovered_from) = match backup_id {
            Some(id) => {
                tracing::info!("Restoring {} from backup {}", path.display(), id);
                (PathBuf::from(id), Some(PathBuf::from(id)))
            }
            None => (path.to_path_buf(), None),
        };

        let (text, lossy) = self.read_text(&source_path).await?;
        let cells = codec::decode(&text);
        tracing::debug!("Opened {} ({} cells)", source_path.display(), cells.len());

        Ok(NotebookData {
            languages: vec![self.language.clone()],
            metadata: NotebookMetadata {
                recovered_from,
                lossy,
            },
            cells,
        })
    }

    /// Read the file at `path` as text.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD and logged; the flag tells
    /// whether that happened.
    pub async fn read_text(&self, path: impl AsRef<Path>) -> SyncResult<(String, bool)> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| SyncError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok((text, false)),
            Err(e) => {
                tracing::warn!(
                    "{} is not valid UTF-8, invalid bytes were replaced",
                    path.display()
                );
                Ok((String::from_utf8_lossy(e.as_bytes()).into_owned(), true))
            }
        }
    }

    /// Open the notebook at `path` as a document.
    pub async fn open_document(&self, path: impl AsRef<Path>) -> SyncResult<Arc<Document>> {
        let path = path.as_ref();
        Ok(self.open(path).await?.into_document(path))
    }

    /// Write `document` back to its own path.
    pub async fn save(&self, document: &Document) -> SyncResult<()> {
        self.save_as(document.path(), document).await
    }

    /// Write `document` to `target`. The document keeps its own path.
    pub async fn save_as(&self, target: impl AsRef<Path>, document: &Document) -> SyncResult<()> {
        let target = target.as_ref();
        let text = codec::encode_document(document)?;
        write(target, &text).await?;
        tracing::info!("Saved {} ({} cells)", target.display(), document.len());
        Ok(())
    }

    /// Write a copy of `document` to `destination` for crash recovery.
    pub async fn backup(
        &self,
        document: &Document,
        destination: impl AsRef<Path>,
    ) -> SyncResult<Backup> {
        let destination = destination.as_ref();
        let text = codec::encode_document(document)?;
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SyncError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        write(destination, &text).await?;
        tracing::debug!(
            "Backed up {} to {}",
            document.path().display(),
            destination.display()
        );

        Ok(Backup {
            id: destination.to_string_lossy().into_owned(),
            path: destination.to_path_buf(),
        })
    }
}

impl Default for ContentProvider {
    fn default() -> Self {
        Self::new()
    }
}

async fn write(path: &Path, text: &str) -> SyncResult<()> {
    tokio::fs::write(path, text)
        .await
        .map_err(|source| SyncError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_missing_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.jsnb");
        let err = ContentProvider::new().open(&missing).await.unwrap_err();
        match err {
            SyncError::Read { path, source } => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("Expected read error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_replaces_invalid_utf8() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.jsnb");
        std::fs::write(&path, b"'ok'\n/*--< CELL DELIM >--*/\n'\xff'").unwrap();

        let data = ContentProvider::new().open(&path).await.unwrap();
        assert!(data.metadata.lossy);
        assert_eq!(data.cells.len(), 2);
        assert_eq!(data.cells[1].source(), "'\u{FFFD}'");
        assert_eq!(data.languages, vec!["javascript"]);
    }

    #[tokio::test]
    async fn test_save_rejects_delimiter() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.jsnb");
        let doc = Document::new(&path, vec![Cell::new("'/*--< CELL DELIM >--*/'")]);

        let err = ContentProvider::new().save(&doc).await.unwrap_err();
        assert!(matches!(err, SyncError::DelimiterInSource { index: 0 }));
        // Nothing is written when encoding fails.
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_missing_backup() {
        let temp = TempDir::new().unwrap();
        let backup = Backup {
            id: "gone".to_string(),
            path: temp.path().join("gone.jsnb"),
        };
        backup.delete().await.unwrap();
    }
}
