//! Command script line grammar.
//!
//! ```text
//! # comment                  skipped (also `!` and blank lines)
//! *                          next command changes the prompt
//! @,<secs>,<send>,<regex>    send, then wait for <regex> instead of the prompt
//! anything else              plain command
//! ```

use std::time::Duration;

use regex::bytes::Regex;

use super::config::MAX_TIMEOUT_SECS;
use crate::error::{Error, Result};

/// A directive that sends text and waits for an arbitrary pattern.
#[derive(Debug, Clone)]
pub struct TimedExchange {
    /// How long to wait for `expect`.
    pub timeout: Duration,
    /// Line to send.
    pub send: String,
    /// Pattern that ends the wait.
    pub expect: Regex,
}

/// One parsed script line.
#[derive(Debug, Clone)]
pub enum Directive {
    /// Comment or blank line.
    Comment,
    /// The next command changes the prompt; resynchronize after it.
    PromptChange,
    /// `@,timeout,send,expect`.
    Timed(TimedExchange),
    /// Anything else, sent verbatim.
    Command(String),
}

impl Directive {
    /// Parse one script line. Trailing whitespace is ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end();
        let first = line.trim_start().chars().next();

        match first {
            None | Some('#') | Some('!') => return Ok(Self::Comment),
            _ => {}
        }

        if line.starts_with('*') {
            return Ok(Self::PromptChange);
        }

        if line.starts_with('@') {
            return Self::parse_timed(line).map(Self::Timed);
        }

        Ok(Self::Command(line.to_string()))
    }

    fn parse_timed(line: &str) -> Result<TimedExchange> {
        let invalid = |reason: &str| Error::DirectiveParseError {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        // only the pattern may contain commas
        let fields: Vec<&str> = line.splitn(4, ',').collect();
        let [marker, timeout, send, expect] = fields.as_slice() else {
            return Err(invalid("expected @,<timeout>,<send>,<expect>"));
        };
        if *marker != "@" {
            return Err(invalid("expected ',' after '@'"));
        }

        let seconds: u64 = timeout
            .trim()
            .parse()
            .map_err(|_| invalid("timeout is not a whole number of seconds"))?;
        if seconds > MAX_TIMEOUT_SECS {
            return Err(invalid(&format!(
                "timeout exceeds {MAX_TIMEOUT_SECS} seconds"
            )));
        }
        if expect.is_empty() {
            return Err(invalid("empty expect pattern"));
        }
        let expect = Regex::new(expect).map_err(|e| invalid(&e.to_string()))?;

        Ok(TimedExchange {
            timeout: Duration::from_secs(seconds),
            send: send.to_string(),
            expect,
        })
    }
}
