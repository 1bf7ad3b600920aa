//! Session summary writer.

use std::io::{self, Write};

use crate::driver::Exchange;

/// Writes one block per exchange and a completion trailer.
///
/// ```text
///
/// ### show clock ###
/// 12:00:01.123 UTC Mon Mar 1 2021
///
/// !!! Completed core1 (192.0.2.1) !!!
/// ```
#[derive(Debug)]
pub struct Transcript<W: Write> {
    sink: W,
}

impl<W: Write> Transcript<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Write the header and output of one exchange.
    pub fn record(&mut self, exchange: &Exchange) -> io::Result<()> {
        write!(self.sink, "\n### {} ###\n{}", exchange.command, exchange.output)?;
        self.sink.flush()
    }

    /// Write the completion trailer for `target` (`host (ip)`).
    pub fn finish(&mut self, target: &str) -> io::Result<()> {
        write!(self.sink, "\n!!! Completed {} !!!\n", target)?;
        self.sink.flush()
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_record_and_finish() {
        let mut transcript = Transcript::new(Vec::new());
        let exchange = Exchange::new(
            "show clock",
            "show clock\r\n12:00:01 UTC",
            Duration::from_millis(20),
        );

        transcript.record(&exchange).unwrap();
        transcript.finish("core1 (192.0.2.1)").unwrap();

        let text = String::from_utf8(transcript.into_inner()).unwrap();
        assert_eq!(
            text,
            "\n### show clock ###\n12:00:01 UTC\n!!! Completed core1 (192.0.2.1) !!!\n"
        );
    }

    #[test]
    fn test_empty_output() {
        let mut transcript = Transcript::new(Vec::new());
        let exchange = Exchange::new("configure terminal", "configure terminal", Duration::ZERO);

        transcript.record(&exchange).unwrap();

        let text = String::from_utf8(transcript.into_inner()).unwrap();
        assert_eq!(text, "\n### configure terminal ###\n");
    }
}
