//! Integration tests for notebook storage.
//!
//! Tests the full pipeline: document → .jsnb → document.

use std::fs;
use tempfile::TempDir;

use cellpad_core::{Cell, Document};
use cellpad_sync::{CELL_DELIMITER, ContentProvider, SyncError, decode, encode};

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a temporary directory for test artifacts.
fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

fn document(path: impl Into<std::path::PathBuf>, sources: &[&str]) -> Document {
    Document::new(path, sources.iter().map(|s| Cell::new(*s)).collect())
}

fn sources(cells: &[Cell]) -> Vec<String> {
    cells.iter().map(|c| c.source()).collect()
}

// =============================================================================
// Codec Tests
// =============================================================================

#[test]
fn test_roundtrip_modulo_trim() {
    let inputs: &[&[&str]] = &[
        &["const a = 1", "a + 1"],
        &["  padded  ", "\n\nnewlines\n\n", ""],
        &["function f() {\n  return 42;\n}", "f()"],
        &["// unicode: 你好世界 🚀", "'Hello 世界!'"],
        &[""],
    ];

    for input in inputs {
        let text = encode(*input).unwrap();
        let expected: Vec<String> = input.iter().map(|s| s.trim().to_string()).collect();
        assert_eq!(sources(&decode(&text)), expected, "round trip of {:?}", input);
    }
}

#[test]
fn test_empty_boundaries() {
    assert_eq!(encode::<&str>(&[]).unwrap(), "");
    // The degenerate single segment: empty text is one empty cell.
    assert_eq!(sources(&decode("")), vec![""]);
}

#[test]
fn test_delimiter_collision_is_rejected() {
    let marker = format!("const marker = '{}'", CELL_DELIMITER);
    let input = ["ok", "fine", marker.as_str()];
    match encode(&input) {
        Err(SyncError::DelimiterInSource { index }) => assert_eq!(index, 2),
        other => panic!("Expected delimiter rejection, got {:?}", other),
    }
}

// =============================================================================
// Content Provider Tests
// =============================================================================

#[tokio::test]
async fn test_save_and_reopen() {
    let dir = temp_dir();
    let path = dir.path().join("notes.jsnb");
    let doc = document(&path, &["let total = 0", "total += 5", "total"]);

    let provider = ContentProvider::new();
    provider.save(&doc).await.unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(written.matches(CELL_DELIMITER).count(), 2);

    let reopened = provider.open_document(&path).await.unwrap();
    assert_eq!(reopened.path(), path);
    assert_eq!(reopened.sources(), doc.sources());
    // Fresh cells: new identities, no run state.
    assert_ne!(reopened.cell(0).unwrap().id(), doc.cell(0).unwrap().id());
    assert!(reopened.cells().iter().all(|c| c.outputs().is_empty()));
}

#[tokio::test]
async fn test_open_reports_language() {
    let dir = temp_dir();
    let path = dir.path().join("notes.jsnb");
    fs::write(&path, "1\n\n/*--< CELL DELIM >--*/\n\n2").unwrap();

    let data = ContentProvider::new().open(&path).await.unwrap();
    assert_eq!(data.languages, vec!["javascript"]);
    assert!(data.metadata.recovered_from.is_none());
    assert_eq!(sources(&data.cells), vec!["1", "2"]);
}

#[tokio::test]
async fn test_save_as_keeps_document_path() {
    let dir = temp_dir();
    let original = dir.path().join("a.jsnb");
    let copy = dir.path().join("b.jsnb");
    let doc = document(&original, &["'a'"]);

    ContentProvider::new().save_as(&copy, &doc).await.unwrap();

    assert!(copy.exists());
    assert!(!original.exists());
    assert_eq!(doc.path(), original);
}

#[tokio::test]
async fn test_save_to_missing_directory_fails() {
    let dir = temp_dir();
    let path = dir.path().join("missing").join("notes.jsnb");
    let doc = document(&path, &["1"]);

    match ContentProvider::new().save(&doc).await {
        Err(SyncError::Write { path: failed, .. }) => assert_eq!(failed, path),
        other => panic!("Expected write error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_backup_restore_and_delete() {
    let dir = temp_dir();
    let path = dir.path().join("notes.jsnb");
    let provider = ContentProvider::new();

    let saved = document(&path, &["'saved'"]);
    provider.save(&saved).await.unwrap();

    let edited = document(&path, &["'saved'", "'unsaved edit'"]);
    let backup_path = dir.path().join("backups").join("notes.jsnb.bak");
    let backup = provider.backup(&edited, &backup_path).await.unwrap();
    assert_eq!(backup.path, backup_path);
    assert!(backup_path.exists());

    let restored = provider
        .open_with_backup(&path, Some(&backup.id))
        .await
        .unwrap();
    assert_eq!(sources(&restored.cells), vec!["'saved'", "'unsaved edit'"]);
    assert_eq!(restored.metadata.recovered_from, Some(backup_path.clone()));

    backup.delete().await.unwrap();
    assert!(!backup_path.exists());
    // The notebook itself is untouched.
    assert_eq!(sources(&provider.open(&path).await.unwrap().cells), vec!["'saved'"]);
}
