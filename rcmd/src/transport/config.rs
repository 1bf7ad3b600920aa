//! Transport configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{Error, Result};

/// Default SSH port.
pub const SSH_PORT: u16 = 22;

/// Default Telnet port.
pub const TELNET_PORT: u16 = 23;

/// How the management session is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionMethod {
    /// Secure shell (`S`).
    Ssh,
    /// Telnet (`T`).
    Telnet,
}

impl ConnectionMethod {
    /// Parse the single-character inventory code.
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim() {
            "S" | "s" => Ok(Self::Ssh),
            "T" | "t" => Ok(Self::Telnet),
            other => Err(Error::UnknownConnectionMethod {
                code: other.to_string(),
            }),
        }
    }

    /// The single-character inventory code.
    pub const fn code(self) -> char {
        match self {
            Self::Ssh => 'S',
            Self::Telnet => 'T',
        }
    }

    /// Human readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ssh => "SSH",
            Self::Telnet => "Telnet",
        }
    }
}

impl fmt::Display for ConnectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    /// This is the default and matches common SSH client behavior.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For testing and lab use only.
    Disabled,
}

/// Relay used to reach a device.
///
/// Telnet sessions tunnel through `server:port` with SOCKS4. SSH sessions
/// ignore `server` and go wherever the OpenSSH client configuration in
/// `ssh_config` routes the device address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// SOCKS4 relay host.
    pub server: String,

    /// SOCKS4 relay port.
    pub port: u16,

    /// OpenSSH client configuration used for SSH routing.
    pub ssh_config: PathBuf,
}

/// Everything needed to open a raw interactive channel to a device.
pub struct TransportConfig {
    /// Management address (IP or resolvable name).
    pub host: String,

    /// SSH or Telnet.
    pub method: ConnectionMethod,

    /// Login username.
    pub username: String,

    /// Login password.
    pub password: SecretString,

    /// Optional relay.
    pub proxy: Option<ProxyConfig>,

    /// Bound on TCP connect and on each SSH login phase.
    pub connect_timeout: Duration,

    /// SSH sessions with no traffic for this long are closed.
    pub idle_timeout: Duration,

    /// Pause before answering a password challenge.
    pub password_delay: Duration,

    /// Terminal width for the PTY / NAWS.
    pub terminal_width: u32,

    /// Terminal height for the PTY / NAWS.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("host", &self.host)
            .field("method", &self.method)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("proxy", &self.proxy)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("password_delay", &self.password_delay)
            .field("terminal_width", &self.terminal_width)
            .field("terminal_height", &self.terminal_height)
            .field("host_key_verification", &self.host_key_verification)
            .field("known_hosts_path", &self.known_hosts_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(method: ConnectionMethod) -> TransportConfig {
        TransportConfig {
            host: "10.0.0.1".to_string(),
            method,
            username: "admin".to_string(),
            password: SecretString::from("secret".to_string()),
            proxy: None,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(45),
            password_delay: Duration::from_secs(1),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::Disabled,
            known_hosts_path: None,
        }
    }

    #[test]
    fn test_connection_method_codes() {
        assert_eq!(ConnectionMethod::from_code("S").unwrap(), ConnectionMethod::Ssh);
        assert_eq!(ConnectionMethod::from_code("T").unwrap(), ConnectionMethod::Telnet);
        assert_eq!(ConnectionMethod::Ssh.code(), 'S');
        assert_eq!(ConnectionMethod::Telnet.to_string(), "T");

        let err = ConnectionMethod::from_code("X").unwrap_err();
        assert!(matches!(err, Error::UnknownConnectionMethod { code } if code == "X"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", config(ConnectionMethod::Ssh));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret"));
    }
}
