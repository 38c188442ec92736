//! Scripted sessions for exercising the executor without an interpreter.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cellpad_core::{
    ExecutionError, ExecutionOutput, ExecutionResult, MimeBundle, RaisedError, Session,
};

/// Session answering from a fixed script.
///
/// Code forms:
/// - `1+1` → `{"text/plain": "2"}`
/// - `x.y.z` → `ReferenceError: x is not defined`
/// - `sleep <ms> <value>` → `<value>` after `<ms>` milliseconds
/// - `hang` → never settles
/// - anything else → echoed back as `text/plain`
pub struct ScriptedSession {
    working_dir: PathBuf,
    /// Serialize calls the way an interpreter process does.
    queue: Option<tokio::sync::Mutex<()>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSession {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            queue: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn serialized(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            queue: Some(tokio::sync::Mutex::new(())),
            ..Self::new(working_dir)
        }
    }

    /// Code received so far, in arrival order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn answer(code: &str) -> ExecutionResult {
        match code {
            "1+1" => Ok(text("2")),
            "x.y.z" => Err(ExecutionError::Raised(RaisedError {
                name: "ReferenceError".to_string(),
                message: "x is not defined".to_string(),
                trace: "ReferenceError: x is not defined\n    at cell:1:1".to_string(),
            })),
            "hang" => std::future::pending().await,
            _ => match code.strip_prefix("sleep ").and_then(|rest| rest.split_once(' ')) {
                Some((ms, value)) => {
                    let ms = ms.parse().unwrap();
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(text(value))
                }
                None => Ok(text(code)),
            },
        }
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&self, code: &str) -> ExecutionResult {
        self.calls.lock().unwrap().push(code.to_string());
        match self.queue {
            Some(ref queue) => {
                let _turn = queue.lock().await;
                Self::answer(code).await
            }
            None => Self::answer(code).await,
        }
    }

    fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

pub fn text(value: &str) -> ExecutionOutput {
    let mut mime = MimeBundle::new();
    mime.insert("text/plain".to_string(), serde_json::Value::String(value.to_string()));
    ExecutionOutput { mime }
}
