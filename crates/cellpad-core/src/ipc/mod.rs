//! Inter-process communication with interpreter processes.
//!
//! This module provides the protocol and the process handle used by
//! process-backed sessions.

mod interpreter;
pub mod protocol;

pub use interpreter::InterpreterHandle;
pub use protocol::{Reply, ReplyOutcome, Request, exchange, read_reply, write_message};
