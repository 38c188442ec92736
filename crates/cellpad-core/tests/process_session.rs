//! Process sessions against a shell stand-in for the interpreter.
//!
//! The stand-in logs every code string it receives to `calls.log`, prints
//! some chatter and a reply for another request id, then answers with the
//! code echoed back. `fail` raises an error instead.

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cellpad_core::{
    Cell, CellExecutor, CellOutput, Document, ExecutionError, ProcessSession, RunState, Session,
    SessionConfig,
};
use tempfile::TempDir;

const STAND_IN: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":"\([^"]*\)".*/\1/p')
  code=$(printf '%s\n' "$line" | sed -n 's/.*"code":"\([^"]*\)".*/\1/p')
  printf '%s\n' "$code" >> calls.log
  printf 'warming up\n'
  printf '{"id":"other-%s","status":"ok","mime":"stale"}\n' "$id"
  case "$code" in
    fail) printf '{"id":"%s","status":"error","error":{"ename":"Boom","evalue":"it failed","traceback":["Boom: it failed","    at cell:1"]}}\n' "$id" ;;
    *) printf '{"id":"%s","status":"ok","mime":"%s"}\n' "$id" "$code" ;;
  esac
done
"#;

fn session(dir: &Path) -> ProcessSession {
    let config = SessionConfig::custom("sh", vec!["-c".to_string(), STAND_IN.to_string()])
        .with_timeout(Some(Duration::from_secs(10)));
    ProcessSession::new(dir, config)
}

fn logged_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_replies_are_matched_by_id() {
    let temp = TempDir::new().unwrap();
    let session = session(temp.path());

    let output = session.execute("hello").await.unwrap();
    assert_eq!(output.mime["text/plain"], "hello");
    let output = session.execute("again").await.unwrap();
    assert_eq!(output.mime["text/plain"], "again");
    assert!(session.is_running().await);

    assert_eq!(logged_calls(temp.path()), vec!["hello", "again"]);
}

#[tokio::test]
async fn test_raised_error_is_coerced() {
    let temp = TempDir::new().unwrap();
    let session = session(temp.path());

    match session.execute("fail").await {
        Err(ExecutionError::Raised(raised)) => {
            assert_eq!(raised.name, "Boom");
            assert_eq!(raised.message, "it failed");
            assert_eq!(raised.trace, "Boom: it failed\n    at cell:1");
        }
        other => panic!("Expected raised error, got {:?}", other),
    }

    // The interpreter survives a raised error.
    assert!(session.is_running().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_execute_all_reaches_interpreter_in_order() {
    let temp = TempDir::new().unwrap();
    let executor = Arc::new(CellExecutor::new(Arc::new(session(temp.path()))));
    let sources: Vec<String> = (0..12).map(|i| format!("cell{i}")).collect();

    let doc = Arc::new(Document::new(
        temp.path().join("ordered.jsnb"),
        sources.iter().map(|s| Cell::new(s.as_str())).collect(),
    ));
    let handles = {
        let executor = executor.clone();
        let doc = doc.clone();
        tokio::spawn(async move { executor.execute_all_cells(&doc) })
            .await
            .unwrap()
    };
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), RunState::Success);
    }

    assert_eq!(logged_calls(temp.path()), sources);
    for (cell, source) in doc.cells().iter().zip(&sources) {
        assert_eq!(cell.outputs(), vec![CellOutput::text(source)]);
    }
}
