//! Config-scoped SSH routing.
//!
//! A proxied SSH session goes wherever the named OpenSSH client configuration
//! sends a connection to the device address. `ssh -F <config> -G <ip>` is
//! asked for the resolved route; a `ProxyCommand` or `ProxyJump` becomes a
//! relay process whose stdin/stdout carry the SSH byte stream, anything else
//! is a plain TCP connection to the resolved host and port.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::config::SSH_PORT;
use crate::error::TransportError;

/// OpenSSH client used for route resolution and relaying.
pub const SSH_PROGRAM: &str = "ssh";

/// Shell used to run a `ProxyCommand`.
const SHELL: &str = "sh";

/// Duplex stream over a relay child's stdin/stdout.
pub struct RelayStream {
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl AsyncRead for RelayStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for RelayStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stdin).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdin).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdin).poll_shutdown(cx)
    }
}

/// How the client configuration reaches a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Route {
    /// Resolved `HostName`.
    pub hostname: String,
    /// Resolved `Port`.
    pub port: u16,
    /// Resolved `User`, if the configuration sets one.
    pub user: Option<String>,
    /// `ProxyCommand`, tokens not yet expanded.
    pub proxy_command: Option<String>,
    /// `ProxyJump` hop list, comma separated.
    pub proxy_jump: Option<String>,
}

impl Route {
    /// Parse `ssh -G` output. Unset options fall back to `target` and port 22.
    pub(crate) fn parse(resolved: &str, target: &str) -> Self {
        let mut route = Self {
            hostname: target.to_string(),
            port: SSH_PORT,
            user: None,
            proxy_command: None,
            proxy_jump: None,
        };

        for line in resolved.lines() {
            let Some((key, value)) = line.trim().split_once(char::is_whitespace) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() || value.eq_ignore_ascii_case("none") {
                continue;
            }
            match key.to_ascii_lowercase().as_str() {
                "hostname" => route.hostname = value.to_string(),
                "port" => {
                    if let Ok(port) = value.parse() {
                        route.port = port;
                    }
                }
                "user" => route.user = Some(value.to_string()),
                "proxycommand" => route.proxy_command = Some(value.to_string()),
                "proxyjump" => route.proxy_jump = Some(value.to_string()),
                _ => {}
            }
        }

        route
    }

    /// Ask the OpenSSH client where `target` goes under `ssh_config`.
    pub(crate) async fn resolve(ssh_config: &Path, target: &str) -> Result<Self, TransportError> {
        let output = Command::new(SSH_PROGRAM)
            .arg("-F")
            .arg(ssh_config)
            .arg("-G")
            .arg(target)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TransportError::RelayProcess {
                program: SSH_PROGRAM.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(TransportError::RelayRoute {
                config: ssh_config.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let route = Self::parse(&String::from_utf8_lossy(&output.stdout), target);
        debug!("route to {} via {}: {:?}", target, ssh_config.display(), route);
        Ok(route)
    }

    /// Program and arguments of the relay process, if any.
    ///
    /// `ProxyCommand` wins over `ProxyJump`, as it does for OpenSSH.
    pub(crate) fn relay_command(
        &self,
        ssh_config: &Path,
        username: &str,
    ) -> Option<(&'static str, Vec<String>)> {
        if let Some(command) = &self.proxy_command {
            let user = self.user.as_deref().unwrap_or(username);
            let expanded = expand_tokens(command, &self.hostname, self.port, user);
            return Some((SHELL, vec!["-c".to_string(), format!("exec {expanded}")]));
        }

        let jumps = self.proxy_jump.as_deref()?;
        let (earlier, last) = match jumps.rsplit_once(',') {
            Some((earlier, last)) => (Some(earlier), last),
            None => (None, jumps),
        };

        let mut args = vec!["-F".to_string(), ssh_config.display().to_string()];
        if let Some(earlier) = earlier {
            args.push("-J".to_string());
            args.push(earlier.to_string());
        }
        args.push("-W".to_string());
        args.push(format!("{}:{}", self.hostname, self.port));
        args.push(last.to_string());
        Some((SSH_PROGRAM, args))
    }
}

/// Expand the `ProxyCommand` tokens rcmd knows about.
fn expand_tokens(command: &str, host: &str, port: u16, user: &str) -> String {
    let mut out = String::with_capacity(command.len());
    let mut chars = command.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('h') => out.push_str(host),
            Some('p') => out.push_str(&port.to_string()),
            Some('r') => out.push_str(user),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Start a relay process and return the child (kept alive by the caller)
/// and its stream.
pub(crate) fn spawn_relay(
    program: &str,
    args: &[String],
) -> Result<(Child, RelayStream), TransportError> {
    debug!("starting relay: {} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| TransportError::RelayProcess {
            program: program.to_string(),
            source,
        })?;

    let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
        (Some(stdin), Some(stdout)) => (stdin, stdout),
        _ => {
            return Err(TransportError::RelayProcess {
                program: program.to_string(),
                source: io::Error::other("relay stdio not captured"),
            });
        }
    };

    Ok((child, RelayStream { stdin, stdout }))
}
