//! IPC protocol messages for interpreter processes.
//!
//! Uses newline-delimited JSON over stdin/stdout. Every request carries a
//! fresh id that the reply must echo, so a reply can always be matched to
//! the request that caused it.
//!
//! Replies are loosely typed on the interpreter side. They are coerced
//! into [`Reply`] here and nowhere else:
//! - a missing `status` is inferred from the presence of `error`
//! - a non-object `mime` becomes `{"text/plain": <value>}`
//! - a `traceback` array is joined with newlines
//! - missing error names default to `"Error"`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::session::RaisedError;
use crate::state::{MimeBundle, TEXT_PLAIN};

/// Request sent from the session to the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id echoed by the reply.
    pub id: String,
    /// Code to evaluate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Ask the interpreter to exit.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shutdown: bool,
}

impl Request {
    /// Evaluate `code`.
    pub fn execute(code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code: Some(code.into()),
            shutdown: false,
        }
    }

    /// Shut the interpreter down gracefully.
    pub fn shutdown() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code: None,
            shutdown: true,
        }
    }
}

/// Outcome carried by a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// The code evaluated to a value, rendered per MIME type.
    Ok(MimeBundle),
    /// The code raised an error.
    Error(RaisedError),
}

/// Reply sent from the interpreter to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Id of the request this answers.
    pub id: String,
    pub outcome: ReplyOutcome,
}

impl Reply {
    /// Coerce a decoded JSON value into a reply.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(Error::Protocol(format!(
                    "reply must be a JSON object, got {}",
                    other
                )));
            }
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(Error::Protocol("reply without an id".to_string())),
        };

        let is_error = match fields.get("status").and_then(Value::as_str) {
            Some("ok") => false,
            Some("error") => true,
            Some(other) => {
                return Err(Error::Protocol(format!("unknown reply status '{}'", other)));
            }
            None => fields.contains_key("error"),
        };

        let outcome = if is_error {
            ReplyOutcome::Error(coerce_error(fields.remove("error")))
        } else {
            ReplyOutcome::Ok(coerce_mime(fields.remove("mime")))
        };

        Ok(Self { id, outcome })
    }

    /// Parse one protocol line.
    pub fn parse(line: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(line)?)
    }
}

fn coerce_mime(value: Option<Value>) -> MimeBundle {
    match value {
        None | Some(Value::Null) => MimeBundle::new(),
        Some(Value::Object(map)) => map.into_iter().collect(),
        Some(Value::String(text)) => plain(text),
        Some(other) => plain(other.to_string()),
    }
}

fn plain(text: String) -> MimeBundle {
    let mut bundle = MimeBundle::new();
    bundle.insert(TEXT_PLAIN.to_string(), Value::String(text));
    bundle
}

fn coerce_error(value: Option<Value>) -> RaisedError {
    match value {
        Some(Value::Object(fields)) => RaisedError {
            name: text_field(&fields, &["ename", "name"]).unwrap_or_else(|| "Error".to_string()),
            message: text_field(&fields, &["evalue", "message"]).unwrap_or_default(),
            trace: trace_field(&fields),
        },
        Some(Value::String(message)) => RaisedError {
            name: "Error".to_string(),
            message,
            trace: String::new(),
        },
        other => RaisedError {
            name: "Error".to_string(),
            message: other.map(|v| v.to_string()).unwrap_or_default(),
            trace: String::new(),
        },
    }
}

fn text_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match fields.get(*key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

fn trace_field(fields: &Map<String, Value>) -> String {
    match fields.get("traceback").or_else(|| fields.get("stack")) {
        Some(Value::String(trace)) => trace.clone(),
        Some(Value::Array(lines)) => lines
            .iter()
            .map(|line| match line {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Write one request as a JSON line and flush.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, request: &Request) -> Result<()> {
    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');

    writer
        .write_all(&line)
        .await
        .map_err(|e| Error::Ipc(format!("Failed to write request: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Ipc(format!("Failed to flush request: {}", e)))?;

    Ok(())
}

/// Read the next reply.
///
/// Blank lines and lines that are not JSON are interpreter chatter and
/// are skipped. Valid JSON that is not a well-formed reply is an error.
pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Reply> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| Error::Ipc(format!("Failed to read reply: {}", e)))?;
        if read == 0 {
            return Err(Error::Ipc("interpreter closed its output".to_string()));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => return Reply::from_value(value),
            Err(_) => tracing::debug!("Ignoring interpreter output: {}", trimmed),
        }
    }
}

/// Send `code` and read replies until the one answering it arrives.
///
/// Replies carrying another request's id are left over from an abandoned
/// exchange and are discarded.
pub async fn exchange<W, R>(writer: &mut W, reader: &mut R, code: &str) -> Result<ReplyOutcome>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    let request = Request::execute(code);
    tracing::debug!("-> request {} ({} bytes)", request.id, code.len());
    write_message(writer, &request).await?;

    loop {
        let reply = read_reply(reader).await?;
        if reply.id == request.id {
            tracing::debug!("<- reply {}", reply.id);
            return Ok(reply.outcome);
        }
        tracing::warn!(
            "Discarding stale reply {} while waiting for {}",
            reply.id,
            request.id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{BufReader, DuplexStream};
    use tokio::task::JoinHandle;

    /// Stand-in interpreter: answers each request with a reply for some
    /// other id first, then with the code echoed back. Stops after `limit`
    /// requests and closes its end.
    fn fake_interpreter(stream: DuplexStream, limit: usize) -> JoinHandle<()> {
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(stream);
            let mut lines = BufReader::new(read).lines();
            for _ in 0..limit {
                let Ok(Some(line)) = lines.next_line().await else {
                    return;
                };
                let request: Request = serde_json::from_str(&line).unwrap();
                let stale = json!({"id": format!("old-{}", request.id), "status": "ok", "mime": "stale"});
                let reply = json!({"id": request.id, "status": "ok", "mime": request.code});
                write
                    .write_all(format!("{stale}\nbooting\n{reply}\n").as_bytes())
                    .await
                    .unwrap();
            }
        })
    }

    #[test]
    fn test_request_serialization() {
        let request = Request::execute("1 + 1");
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"code\":\"1 + 1\""));
        assert!(!json.contains("shutdown"));

        let shutdown = serde_json::to_string(&Request::shutdown()).unwrap();
        assert!(shutdown.contains("\"shutdown\":true"));
        assert!(!shutdown.contains("code"));
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(Request::execute("a").id, Request::execute("a").id);
    }

    #[test]
    fn test_ok_reply() {
        let reply = Reply::from_value(json!({
            "id": "r1",
            "status": "ok",
            "mime": {"text/plain": "2", "text/html": "<b>2</b>"}
        }))
        .unwrap();
        assert_eq!(reply.id, "r1");
        match reply.outcome {
            ReplyOutcome::Ok(mime) => {
                assert_eq!(mime["text/plain"], json!("2"));
                assert_eq!(mime.len(), 2);
            }
            other => panic!("Wrong outcome: {:?}", other),
        }
    }

    #[test]
    fn test_scalar_mime_is_coerced_to_text() {
        let reply = Reply::from_value(json!({"id": "r2", "mime": 42})).unwrap();
        assert_eq!(reply.outcome, ReplyOutcome::Ok(plain("42".to_string())));

        let reply = Reply::from_value(json!({"id": 7, "status": "ok"})).unwrap();
        assert_eq!(reply.id, "7");
        assert_eq!(reply.outcome, ReplyOutcome::Ok(MimeBundle::new()));
    }

    #[test]
    fn test_error_reply_with_traceback_lines() {
        let reply = Reply::from_value(json!({
            "id": "r3",
            "status": "error",
            "error": {
                "ename": "ReferenceError",
                "evalue": "x is not defined",
                "traceback": ["ReferenceError: x is not defined", "    at cell.js:1:1"]
            }
        }))
        .unwrap();
        assert_eq!(
            reply.outcome,
            ReplyOutcome::Error(RaisedError {
                name: "ReferenceError".to_string(),
                message: "x is not defined".to_string(),
                trace: "ReferenceError: x is not defined\n    at cell.js:1:1".to_string(),
            })
        );
    }

    #[test]
    fn test_error_status_inferred() {
        let reply = Reply::from_value(json!({"id": "r4", "error": "boom"})).unwrap();
        assert_eq!(
            reply.outcome,
            ReplyOutcome::Error(RaisedError {
                name: "Error".to_string(),
                message: "boom".to_string(),
                trace: String::new(),
            })
        );
    }

    #[test]
    fn test_malformed_replies_are_rejected() {
        assert!(matches!(
            Reply::from_value(json!(["not", "an", "object"])),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            Reply::from_value(json!({"status": "ok"})),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            Reply::from_value(json!({"id": "r5", "status": "pending"})),
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_read_reply_skips_chatter() {
        let stream = b"\nDebugger attached.\n{\"id\":\"r6\",\"status\":\"ok\",\"mime\":{}}\n";
        let mut reader = BufReader::new(&stream[..]);
        let reply = read_reply(&mut reader).await.unwrap();
        assert_eq!(reply.id, "r6");

        let err = read_reply(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::Ipc(_)));
    }

    #[tokio::test]
    async fn test_write_message_is_one_line() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Request::execute("let a = 1;\na")).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.ends_with('\n'));

        let decoded: Request = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(decoded.code.as_deref(), Some("let a = 1;\na"));
    }

    #[tokio::test]
    async fn test_exchange_discards_other_ids() {
        let (client, server) = tokio::io::duplex(4096);
        let interpreter = fake_interpreter(server, 2);
        let (read, mut write) = tokio::io::split(client);
        let mut reader = BufReader::new(read);

        let first = exchange(&mut write, &mut reader, "1 + 1").await.unwrap();
        assert_eq!(first, ReplyOutcome::Ok(plain("1 + 1".to_string())));
        let second = exchange(&mut write, &mut reader, "'second'").await.unwrap();
        assert_eq!(second, ReplyOutcome::Ok(plain("'second'".to_string())));

        interpreter.await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_skips_abandoned_reply() {
        let (client, server) = tokio::io::duplex(4096);
        let _interpreter = fake_interpreter(server, 2);
        let (read, mut write) = tokio::io::split(client);
        let mut reader = BufReader::new(read);

        // A request whose caller gave up before reading the reply.
        write_message(&mut write, &Request::execute("abandoned")).await.unwrap();

        let outcome = exchange(&mut write, &mut reader, "current").await.unwrap();
        assert_eq!(outcome, ReplyOutcome::Ok(plain("current".to_string())));
    }

    #[tokio::test]
    async fn test_exchange_fails_when_interpreter_exits() {
        let (client, server) = tokio::io::duplex(4096);
        let interpreter = fake_interpreter(server, 1);
        let (read, mut write) = tokio::io::split(client);
        let mut reader = BufReader::new(read);

        exchange(&mut write, &mut reader, "1").await.unwrap();
        interpreter.await.unwrap();

        // The interpreter is gone, so the next exchange fails.
        let err = exchange(&mut write, &mut reader, "2").await.unwrap_err();
        assert!(matches!(err, Error::Ipc(_)));
    }
}
