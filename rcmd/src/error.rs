//! Error types for rcmd.
//!
//! Every failure inside the session engine is fatal to the session it occurs
//! in. The variants below name the failure kind; the caller decides whether
//! to retry the whole session or give up on the target.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for rcmd operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The transport could not be started or failed immediately.
    #[error("Unable to connect to {target}: {source}")]
    TransportSpawnFailure {
        target: String,
        #[source]
        source: TransportError,
    },

    /// A login step did not see its expected prompt in time.
    #[error("Timeout encountered during login after {0:?}")]
    AuthenticationTimeout(Duration),

    /// The remote side closed the stream during login.
    #[error("EOF encountered during login")]
    AuthenticationEof,

    /// The SSH server rejected every authentication method tried.
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Connection method code is neither SSH nor Telnet.
    #[error("Invalid connection type '{code}'")]
    UnknownConnectionMethod { code: String },

    /// Device type could not be determined or has no initialization entry.
    #[error("Unknown device type")]
    UnknownDeviceType,

    /// An expect call returned an index outside the anticipated set.
    #[error("Unknown expect outcome (pattern index {index})")]
    UnknownExpectOutcome { index: usize },

    /// A scripted command did not see the idle prompt in time.
    #[error("Timeout encountered after {timeout:?} waiting on '{command}'")]
    CommandTimeout { command: String, timeout: Duration },

    /// The remote side closed the stream while a command was running.
    #[error("EOF encountered waiting on '{command}'")]
    CommandEof { command: String },

    /// Malformed `@,...` directive line.
    #[error("Invalid directive '{line}': {reason}")]
    DirectiveParseError { line: String, reason: String },

    /// Device is not present in the inventory.
    #[error("Device does not exist in inventory")]
    DeviceNotFound { host: String },

    /// A numbered inventory selection was out of range or not a number.
    #[error("Invalid selection '{input}'")]
    InvalidSelection { input: String },

    /// The operator quit a numbered inventory selection.
    #[error("Quitting")]
    SelectionCancelled,

    /// Tool configuration is missing or inconsistent.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid regex pattern.
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Transport failure after the session was established.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O error (command files, transcripts, inventory).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

/// Transport layer errors (TCP, SSH, Telnet, relays).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Server presented a host key different from the one on record
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Server is not in known_hosts and strict checking is enabled
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// SOCKS4 relay refused the CONNECT request
    #[error("SOCKS4 relay rejected request (status {status:#04x})")]
    SocksRejected { status: u8 },

    /// Relay process could not be started
    #[error("Failed to start relay '{program}': {source}")]
    RelayProcess {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The OpenSSH client could not resolve a route to the device
    #[error("Failed to resolve SSH route with {config}: {message}")]
    RelayRoute { config: String, message: String },

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias using rcmd's Error.
pub type Result<T> = std::result::Result<T, Error>;
