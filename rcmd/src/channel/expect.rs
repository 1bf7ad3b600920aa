//! Race-expect over a transport.

use std::io::Write;
use std::time::Duration;

use log::{trace, warn};
use regex::bytes::Regex;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use crate::error::TransportError;
use crate::transport::Transport;

/// A pattern that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    /// Position of the winning pattern in the list passed to `expect`.
    pub index: usize,
    /// Text received before the match.
    pub before: String,
    /// The matched text.
    pub matched: String,
}

/// How an expect call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectOutcome {
    /// One of the patterns matched.
    Matched(Matched),
    /// The stream ended first. `before` holds everything left unmatched.
    Eof { before: String },
    /// The deadline passed first. The buffer is left intact.
    Timeout { before: String },
}

/// Interactive channel: a transport plus the buffer patterns are matched on.
pub struct ExpectChannel<T> {
    transport: T,
    buffer: PatternBuffer,
    line_ending: String,
    /// Diagnostic copy of every received chunk.
    mirror: Option<Box<dyn Write + Send>>,
    eof: bool,
}

impl<T: Transport> ExpectChannel<T> {
    /// Wrap a transport.
    pub fn new(transport: T, search_depth: usize, line_ending: impl Into<String>) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(search_depth),
            line_ending: line_ending.into(),
            mirror: None,
            eof: false,
        }
    }

    /// Copy every received chunk, unfiltered, to `sink`.
    pub fn set_mirror(&mut self, sink: Box<dyn Write + Send>) {
        self.mirror = Some(sink);
    }

    /// Send raw bytes.
    ///
    /// Only the length is logged; callers log command text themselves so
    /// passwords stay out of the log.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        trace!("send {} bytes", data.len());
        self.transport.send(data).await
    }

    /// Send `line` followed by the line ending.
    pub async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut data = Vec::with_capacity(line.len() + self.line_ending.len());
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.line_ending.as_bytes());
        self.send(&data).await
    }

    /// Wait until one of `patterns` appears, the stream ends, or `timeout`
    /// passes.
    ///
    /// The earliest match in the received text wins; equal starts go to the
    /// lower index. On a match the buffer is consumed through the end of the
    /// matched text.
    pub async fn expect(
        &mut self,
        patterns: &[&Regex],
        timeout: Duration,
    ) -> Result<ExpectOutcome, TransportError> {
        // a timeout past the end of the clock never fires
        let deadline = Instant::now().checked_add(timeout);
        self.buffer.rewind();

        loop {
            if let Some((index, range)) = self.buffer.find_earliest(patterns) {
                let before = lossy(&self.buffer.as_slice()[..range.start]);
                let consumed = self.buffer.consume(range.end);
                let matched = lossy(&consumed[range.start..]);
                trace!("pattern {} matched {:?}", index, matched);
                return Ok(ExpectOutcome::Matched(Matched {
                    index,
                    before,
                    matched,
                }));
            }

            if self.eof {
                let before = lossy(&self.buffer.take());
                return Ok(ExpectOutcome::Eof { before });
            }

            let received = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, self.transport.recv()).await,
                None => Ok(self.transport.recv().await),
            };
            match received {
                Err(_) => {
                    let before = lossy(self.buffer.as_slice());
                    return Ok(ExpectOutcome::Timeout { before });
                }
                Ok(Ok(Some(chunk))) => {
                    trace!("recv {} bytes", chunk.len());
                    self.mirror_chunk(&chunk);
                    self.buffer.extend(&chunk);
                }
                Ok(Ok(None)) => {
                    trace!("recv eof");
                    self.eof = true;
                }
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    fn mirror_chunk(&mut self, chunk: &[u8]) {
        if let Some(sink) = self.mirror.as_mut() {
            if let Err(e) = sink.write_all(chunk).and_then(|_| sink.flush()) {
                warn!("disabling session mirror: {}", e);
                self.mirror = None;
            }
        }
    }

    /// Discard any buffered, unmatched output.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Whether the remote side has closed the stream.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.transport.close().await
    }
}

fn lossy(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TelnetTransport;
    use std::sync::{Arc, Mutex};
    use tokio_test::io::Builder;

    fn regex(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    #[tokio::test]
    async fn test_match_splits_before_and_matched() {
        let stream = Builder::new()
            .read(b"show clock\r\n12:00:01 UTC")
            .read(b"\r\nswitch#")
            .build();
        let mut channel = ExpectChannel::new(TelnetTransport::new(stream, 80, 24), 1000, "\n");

        let prompt = regex(r"\r\nswitch#");
        let outcome = channel
            .expect(&[&prompt], Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ExpectOutcome::Matched(Matched {
                index: 0,
                before: "show clock\r\n12:00:01 UTC".to_string(),
                matched: "\r\nswitch#".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_unbounded_timeout_still_matches() {
        let stream = Builder::new().read(b"Proceed? [confirm]").build();
        let mut channel = ExpectChannel::new(TelnetTransport::new(stream, 80, 24), 1000, "\n");

        let confirm = regex(r"\[confirm\]");
        let outcome = channel.expect(&[&confirm], Duration::MAX).await.unwrap();

        assert!(matches!(outcome, ExpectOutcome::Matched(m) if m.before == "Proceed? "));
    }

    #[tokio::test]
    async fn test_leftover_output_carries_to_next_expect() {
        let stream = Builder::new().read(b"one> two> ").build();
        let mut channel = ExpectChannel::new(TelnetTransport::new(stream, 80, 24), 1000, "\n");

        let prompt = regex(r"\w+>");
        let first = channel.expect(&[&prompt], Duration::from_secs(5)).await.unwrap();
        let second = channel.expect(&[&prompt], Duration::from_secs(5)).await.unwrap();

        assert!(matches!(first, ExpectOutcome::Matched(m) if m.matched == "one>"));
        assert!(matches!(second, ExpectOutcome::Matched(m) if m.matched == "two>" && m.before == " "));
    }

    #[tokio::test]
    async fn test_eof_returns_remaining_text() {
        let stream = Builder::new().read(b"Connection closed").build();
        let mut channel = ExpectChannel::new(TelnetTransport::new(stream, 80, 24), 1000, "\n");

        let prompt = regex(r"#");
        let outcome = channel.expect(&[&prompt], Duration::from_secs(5)).await.unwrap();

        assert_eq!(
            outcome,
            ExpectOutcome::Eof {
                before: "Connection closed".to_string()
            }
        );
        assert!(channel.is_eof());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_buffer() {
        let stream = Builder::new()
            .read(b"partial output")
            .wait(Duration::from_secs(60))
            .build();
        let mut channel = ExpectChannel::new(TelnetTransport::new(stream, 80, 24), 1000, "\n");

        let prompt = regex(r"#");
        let outcome = channel.expect(&[&prompt], Duration::from_secs(2)).await.unwrap();

        assert_eq!(
            outcome,
            ExpectOutcome::Timeout {
                before: "partial output".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_send_line_appends_line_ending() {
        let stream = Builder::new().write(b"show version\r\n").build();
        let mut channel = ExpectChannel::new(TelnetTransport::new(stream, 80, 24), 1000, "\n");

        channel.send_line("show version").await.unwrap();
    }

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_mirror_sees_raw_bytes() {
        let stream = Builder::new().read(b"\x1b[1mrouter>\x1b[0m").build();
        let mut channel = ExpectChannel::new(TelnetTransport::new(stream, 80, 24), 1000, "\n");
        let sink = SharedSink::default();
        channel.set_mirror(Box::new(sink.clone()));

        let prompt = regex(r"router>");
        channel.expect(&[&prompt], Duration::from_secs(5)).await.unwrap();

        assert_eq!(sink.0.lock().unwrap().as_slice(), b"\x1b[1mrouter>\x1b[0m");
    }
}
