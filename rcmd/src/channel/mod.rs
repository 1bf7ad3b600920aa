//! Channel layer for pattern matching over a transport.
//!
//! This module handles the interactive side of a session: accumulating
//! output, stripping ANSI sequences, and racing a set of patterns against
//! end-of-stream and a deadline.

mod buffer;
mod expect;
pub mod patterns;

pub use buffer::PatternBuffer;
pub use expect::{ExpectChannel, ExpectOutcome, Matched};
pub use patterns::PromptPattern;
