//! Exchange type for command execution results.

use std::time::Duration;

use serde::Serialize;

/// One command sent and what came back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    /// The command text as it appeared in the script.
    pub command: String,

    /// Output with the echoed input line removed and line endings normalized.
    pub output: String,

    /// Everything received before the idle prompt (or directive pattern).
    pub raw_output: String,

    /// Time taken from send to match.
    #[serde(skip)]
    pub elapsed: Duration,
}

impl Exchange {
    /// Build an exchange from raw captured text.
    pub fn new(command: impl Into<String>, raw_output: impl Into<String>, elapsed: Duration) -> Self {
        let raw_output = raw_output.into();
        Self {
            command: command.into(),
            output: extract_output(&raw_output),
            raw_output,
            elapsed,
        }
    }
}

/// Drop the echoed input line and normalize `\r\n` to `\n`.
///
/// Text without any newline is all echo, so the result is empty.
pub fn extract_output(raw: &str) -> String {
    match raw.find('\n') {
        Some(idx) => raw[idx + 1..].replace("\r\n", "\n"),
        None => String::new(),
    }
}
