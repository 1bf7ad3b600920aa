//! Telnet transport with minimal option negotiation.
//!
//! Enough of RFC 854 to drive a network device CLI: the server may echo and
//! suppress go-ahead, we report a VT100 terminal and the window size, and
//! every other option is refused.

use std::io;
use std::mem;

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{Transport, tcp_connect};
use super::config::{ProxyConfig, TELNET_PORT, TransportConfig};
use super::socks::socks4_connect;
use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;
const OPT_TTYPE: u8 = 24;
const OPT_NAWS: u8 = 31;

const TTYPE_IS: u8 = 0;
const TTYPE_SEND: u8 = 1;

const TERMINAL_TYPE: &[u8] = b"VT100";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Telnet client over any async byte stream.
pub struct TelnetTransport<S> {
    stream: S,
    state: State,
    /// Last data byte was a bare CR; a following NUL is padding.
    after_cr: bool,
    subnegotiation: Vec<u8>,
    /// Decoded terminal output not yet handed to the caller.
    decoded: Vec<u8>,
    /// Negotiation replies not yet written.
    replies: Vec<u8>,
    width: u16,
    height: u16,
}

impl TelnetTransport<TcpStream> {
    /// Connect straight to the device's Telnet port.
    pub async fn connect(config: &TransportConfig) -> Result<Self, TransportError> {
        let stream = tcp_connect(config, &config.host, TELNET_PORT).await?;
        Ok(Self::new(stream, config.terminal_width, config.terminal_height))
    }

    /// Connect through a SOCKS4 relay.
    pub async fn connect_via_socks4(
        config: &TransportConfig,
        proxy: &ProxyConfig,
    ) -> Result<Self, TransportError> {
        let mut stream = tcp_connect(config, &proxy.server, proxy.port).await?;
        tokio::time::timeout(
            config.connect_timeout,
            socks4_connect(&mut stream, &config.host, TELNET_PORT),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.connect_timeout))??;
        Ok(Self::new(stream, config.terminal_width, config.terminal_height))
    }
}

impl<S> TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already connected stream.
    pub fn new(stream: S, width: u32, height: u32) -> Self {
        Self {
            stream,
            state: State::Data,
            after_cr: false,
            subnegotiation: Vec::new(),
            decoded: Vec::new(),
            replies: Vec::new(),
            width: u16::try_from(width).unwrap_or(u16::MAX),
            height: u16::try_from(height).unwrap_or(u16::MAX),
        }
    }

    fn decode(&mut self, mut input: &[u8]) {
        while !input.is_empty() {
            // plain text runs up to the next IAC or CR
            if matches!(self.state, State::Data) && !self.after_cr {
                let plain = memchr::memchr2(IAC, b'\r', input).unwrap_or(input.len());
                self.decoded.extend_from_slice(&input[..plain]);
                input = &input[plain..];
                if input.is_empty() {
                    break;
                }
            }
            self.step(input[0]);
            input = &input[1..];
        }
    }

    fn step(&mut self, byte: u8) {
        self.state = match self.state {
            State::Data => match byte {
                IAC => State::Iac,
                0 if self.after_cr => {
                    self.after_cr = false;
                    State::Data
                }
                _ => {
                    self.after_cr = byte == b'\r';
                    self.decoded.push(byte);
                    State::Data
                }
            },
            State::Iac => match byte {
                IAC => {
                    self.after_cr = false;
                    self.decoded.push(IAC);
                    State::Data
                }
                WILL | WONT | DO | DONT => State::Negotiate(byte),
                SB => {
                    self.subnegotiation.clear();
                    State::Sub
                }
                // NOP, GA, data mark and friends carry nothing for us
                _ => State::Data,
            },
            State::Negotiate(verb) => {
                self.negotiate(verb, byte);
                State::Data
            }
            State::Sub => match byte {
                IAC => State::SubIac,
                _ => {
                    self.subnegotiation.push(byte);
                    State::Sub
                }
            },
            State::SubIac => match byte {
                SE => {
                    self.subnegotiate();
                    State::Data
                }
                IAC => {
                    self.subnegotiation.push(IAC);
                    State::Sub
                }
                _ => State::Sub,
            },
        };
    }

    fn negotiate(&mut self, verb: u8, option: u8) {
        trace!("telnet recv {} {}", verb_name(verb), option);
        match verb {
            WILL => {
                let answer = if matches!(option, OPT_ECHO | OPT_SGA) { DO } else { DONT };
                self.replies.extend_from_slice(&[IAC, answer, option]);
            }
            DO => match option {
                OPT_NAWS => {
                    self.replies.extend_from_slice(&[IAC, WILL, OPT_NAWS]);
                    self.window_size();
                }
                OPT_TTYPE | OPT_SGA => self.replies.extend_from_slice(&[IAC, WILL, option]),
                _ => {
                    debug!("telnet refusing option {}", option);
                    self.replies.extend_from_slice(&[IAC, WONT, option]);
                }
            },
            _ => {}
        }
    }

    fn window_size(&mut self) {
        self.replies.extend_from_slice(&[IAC, SB, OPT_NAWS]);
        let [w_hi, w_lo] = self.width.to_be_bytes();
        let [h_hi, h_lo] = self.height.to_be_bytes();
        for byte in [w_hi, w_lo, h_hi, h_lo] {
            self.replies.push(byte);
            if byte == IAC {
                self.replies.push(IAC);
            }
        }
        self.replies.extend_from_slice(&[IAC, SE]);
    }

    fn subnegotiate(&mut self) {
        if self.subnegotiation.as_slice() == [OPT_TTYPE, TTYPE_SEND] {
            self.replies.extend_from_slice(&[IAC, SB, OPT_TTYPE, TTYPE_IS]);
            self.replies.extend_from_slice(TERMINAL_TYPE);
            self.replies.extend_from_slice(&[IAC, SE]);
        }
        self.subnegotiation.clear();
    }
}

/// Escape outgoing data: double every IAC and turn a bare LF into CR LF.
fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    let mut prev = 0u8;
    for &byte in data {
        match byte {
            IAC => out.extend_from_slice(&[IAC, IAC]),
            b'\n' if prev != b'\r' => out.extend_from_slice(b"\r\n"),
            _ => out.push(byte),
        }
        prev = byte;
    }
    out
}

fn verb_name(verb: u8) -> &'static str {
    match verb {
        WILL => "WILL",
        WONT => "WONT",
        DO => "DO",
        DONT => "DONT",
        _ => "?",
    }
}

impl<S> Transport for TelnetTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(&encode(data)).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut buf = [0u8; 4096];
        loop {
            if !self.replies.is_empty() {
                // drain only what was written so a cancelled recv resumes the rest
                while !self.replies.is_empty() {
                    let n = self.stream.write(&self.replies).await?;
                    if n == 0 {
                        return Err(io::Error::from(io::ErrorKind::WriteZero).into());
                    }
                    self.replies.drain(..n);
                }
                self.stream.flush().await?;
            }
            if !self.decoded.is_empty() {
                return Ok(Some(mem::take(&mut self.decoded)));
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.decode(&buf[..n]);
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_encode_line_endings_and_iac() {
        assert_eq!(encode(b"show version\n"), b"show version\r\n");
        assert_eq!(encode(b"already\r\n"), b"already\r\n");
        assert_eq!(encode(&[b'a', IAC, b'b']), vec![b'a', IAC, IAC, b'b']);
        assert_eq!(encode(b"\x1b"), b"\x1b");
    }

    #[tokio::test]
    async fn test_plain_data_passes_through() {
        let stream = Builder::new().read(b"Username: ").build();
        let mut telnet = TelnetTransport::new(stream, 511, 24);

        assert_eq!(telnet.recv().await.unwrap(), Some(b"Username: ".to_vec()));
        assert_eq!(telnet.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_negotiation_replies() {
        let stream = Builder::new()
            .read(&[IAC, WILL, OPT_ECHO, IAC, DO, OPT_NAWS, IAC, DO, 39])
            .write(&[
                IAC, DO, OPT_ECHO, // accept server echo
                IAC, WILL, OPT_NAWS, IAC, SB, OPT_NAWS, 0x01, 0xFF, 0xFF, 0x00, 0x18, IAC, SE,
                IAC, WONT, 39,
            ])
            .read(b"login: ")
            .build();
        let mut telnet = TelnetTransport::new(stream, 511, 24);

        assert_eq!(telnet.recv().await.unwrap(), Some(b"login: ".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_survive_cancelled_recv() {
        let (client, mut server) = tokio::io::duplex(4);
        let mut telnet = TelnetTransport::new(client, 511, 24);

        server.write_all(&[IAC, DO, OPT_NAWS]).await.unwrap();
        let cancelled =
            tokio::time::timeout(std::time::Duration::from_millis(100), telnet.recv()).await;
        assert!(cancelled.is_err());

        let mut written = vec![0u8; 4];
        server.read_exact(&mut written).await.unwrap();

        let (received, rest) = tokio::join!(telnet.recv(), async {
            let mut rest = vec![0u8; 9];
            server.read_exact(&mut rest).await.unwrap();
            server.write_all(b"> ").await.unwrap();
            rest
        });
        written.extend(rest);

        assert_eq!(
            written,
            [IAC, WILL, OPT_NAWS, IAC, SB, OPT_NAWS, 0x01, 0xFF, 0xFF, 0x00, 0x18, IAC, SE]
        );
        assert_eq!(received.unwrap(), Some(b"> ".to_vec()));
    }

    #[tokio::test]
    async fn test_terminal_type_subnegotiation() {
        let stream = Builder::new()
            .read(&[IAC, SB, OPT_TTYPE, TTYPE_SEND, IAC, SE, b'>'])
            .write(&[IAC, SB, OPT_TTYPE, TTYPE_IS, b'V', b'T', b'1', b'0', b'0', IAC, SE])
            .build();
        let mut telnet = TelnetTransport::new(stream, 80, 24);

        assert_eq!(telnet.recv().await.unwrap(), Some(b">".to_vec()));
    }

    #[tokio::test]
    async fn test_escaped_iac_and_cr_nul() {
        let stream = Builder::new()
            .read(&[b'a', IAC, IAC, b'\r', 0, b'b'])
            .build();
        let mut telnet = TelnetTransport::new(stream, 80, 24);

        assert_eq!(
            telnet.recv().await.unwrap(),
            Some(vec![b'a', IAC, b'\r', b'b'])
        );
    }
}
