//! Transport layer: raw interactive byte channels to a device.
//!
//! Every transport offers the same two primitives, `send` and `recv`, so the
//! session engine above it never needs to know whether it is talking SSH,
//! Telnet, or either one through a relay.

pub mod config;
mod relay;
mod socks;
mod ssh;
mod telnet;

use std::future::Future;

use log::debug;
use tokio::net::TcpStream;

pub use config::{ConnectionMethod, HostKeyVerification, ProxyConfig, TransportConfig};
pub use socks::socks4_connect;
pub use ssh::{SshLogin, SshTransport};
pub use telnet::TelnetTransport;

use crate::error::TransportError;

/// A raw, ordered, bidirectional byte channel to a remote shell.
///
/// `recv` must be cancel safe: the expect layer races it against a deadline
/// and drops the future when the deadline passes.
pub trait Transport: Send {
    /// Write bytes to the remote side.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next chunk of output. `Ok(None)` means end of stream.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Tear the channel down without waiting for the remote side.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// TCP connect bounded by the connect timeout.
pub(crate) async fn tcp_connect(
    config: &TransportConfig,
    host: &str,
    port: u16,
) -> Result<TcpStream, TransportError> {
    debug!("tcp connect {}:{}", host, port);
    tokio::time::timeout(config.connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| TransportError::Timeout(config.connect_timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: host.to_string(),
            port,
            source,
        })
}

/// Which in-band login steps remain once the transport is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InBandLogin {
    /// Authenticated at the protocol level; only the first prompt is pending.
    None,
    /// The device will ask for a password on the terminal.
    Password,
    /// The device will ask for a username, then a password.
    UsernameAndPassword,
}

/// The transports built into rcmd.
pub enum AnyTransport {
    /// SSH, direct or through a relay process.
    Ssh(SshTransport),
    /// Telnet, direct or SOCKS4-relayed.
    Telnet(TelnetTransport<TcpStream>),
}

impl AnyTransport {
    /// Open the channel described by `config`.
    ///
    /// SSH authenticates in-protocol here. Telnet only connects; the caller
    /// drives the username/password exchange through the returned
    /// [`InBandLogin`].
    pub async fn open(config: &TransportConfig) -> Result<(Self, InBandLogin), TransportError> {
        match config.method {
            ConnectionMethod::Ssh => {
                let (transport, login) = SshTransport::connect(config).await?;
                let in_band = match login {
                    SshLogin::Authenticated => InBandLogin::None,
                    SshLogin::InBand => InBandLogin::Password,
                };
                Ok((Self::Ssh(transport), in_band))
            }
            ConnectionMethod::Telnet => {
                let transport = match &config.proxy {
                    Some(proxy) => {
                        debug!(
                            "telnet to {} via socks4 relay {}:{}",
                            config.host, proxy.server, proxy.port
                        );
                        TelnetTransport::connect_via_socks4(config, proxy).await?
                    }
                    None => TelnetTransport::connect(config).await?,
                };
                Ok((Self::Telnet(transport), InBandLogin::UsernameAndPassword))
            }
        }
    }
}

impl Transport for AnyTransport {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self {
            Self::Ssh(t) => t.send(data).await,
            Self::Telnet(t) => t.send(data).await,
        }
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self {
            Self::Ssh(t) => t.recv().await,
            Self::Telnet(t) => t.recv().await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self {
            Self::Ssh(t) => t.close().await,
            Self::Telnet(t) => t.close().await,
        }
    }
}
