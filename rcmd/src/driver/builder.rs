//! Builder for connecting device sessions.

use std::io::Write;

use log::debug;
use secrecy::SecretString;

use super::config::SessionConfig;
use super::session::{Session, SessionParts};
use crate::channel::ExpectChannel;
use crate::error::{Error, Result, TransportError};
use crate::platform::DeviceType;
use crate::transport::{
    AnyTransport, ConnectionMethod, InBandLogin, ProxyConfig, Transport, TransportConfig,
};

/// Builder for connecting a [`Session`].
///
/// # Example
///
/// ```rust,no_run
/// use rcmd::driver::SessionBuilder;
/// use rcmd::platform::DeviceType;
/// use rcmd::transport::ConnectionMethod;
///
/// # async fn example() -> Result<(), rcmd::Error> {
/// let mut session = SessionBuilder::new("core1", "192.0.2.10")
///     .device_type(DeviceType::Ios)
///     .method(ConnectionMethod::Ssh)
///     .username("netops")
///     .password("secret")
///     .connect()
///     .await?;
///
/// let exchange = session.send_command("show clock").await?;
/// println!("{}", exchange.output);
/// session.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    hostname: String,
    ip: String,
    device_type: DeviceType,
    method: ConnectionMethod,
    username: String,
    password: String,
    enable_password: Option<String>,
    proxy: Option<ProxyConfig>,
    config: SessionConfig,
    detect_os: bool,
    mirror: Option<Box<dyn Write + Send>>,
}

impl SessionBuilder {
    /// Create a builder for the device `hostname` at `ip`.
    pub fn new(hostname: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ip: ip.into(),
            device_type: DeviceType::Unknown,
            method: ConnectionMethod::Ssh,
            username: String::new(),
            password: String::new(),
            enable_password: None,
            proxy: None,
            config: SessionConfig::default(),
            detect_os: false,
            mirror: None,
        }
    }

    /// Set the device type. `Unknown` forces detection.
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Set the connection method (default: SSH).
    pub fn method(mut self, method: ConnectionMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the login username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the login password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the enable password (default: the login password).
    pub fn enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = Some(password.into());
        self
    }

    /// Route the connection through a relay.
    pub fn proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Replace the session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Run OS detection even when the device type is known.
    pub fn detect_os(mut self, detect: bool) -> Self {
        self.detect_os = detect;
        self
    }

    /// Mirror every received byte to `sink`.
    pub fn mirror(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.mirror = Some(sink);
        self
    }

    /// Mirror received bytes to stdout.
    pub fn debug(self, enabled: bool) -> Self {
        if enabled {
            self.mirror(Box::new(std::io::stdout()))
        } else {
            self
        }
    }

    /// `hostname (ip)`.
    pub fn target(&self) -> String {
        format!("{} ({})", self.hostname, self.ip)
    }

    fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            host: self.ip.clone(),
            method: self.method,
            username: self.username.clone(),
            password: SecretString::from(self.password.clone()),
            proxy: self.proxy.clone(),
            connect_timeout: self.config.login_timeout,
            idle_timeout: self.config.command_timeout.max(self.config.login_timeout),
            password_delay: self.config.password_delay,
            terminal_width: self.config.terminal_width,
            terminal_height: self.config.terminal_height,
            host_key_verification: self.config.host_key_verification.clone(),
            known_hosts_path: self.config.known_hosts_path.clone(),
        }
    }

    /// Open the transport and bring the session up.
    pub async fn connect(self) -> Result<Session<AnyTransport>> {
        let target = self.target();
        debug!("connecting to {} via {}", target, self.method.name());

        let (transport, in_band) = AnyTransport::open(&self.transport_config())
            .await
            .map_err(|source| match source {
                TransportError::AuthenticationFailed { user } => {
                    Error::AuthenticationFailed { user }
                }
                source => Error::TransportSpawnFailure { target, source },
            })?;

        self.connect_with(transport, in_band).await
    }

    /// Bring a session up over an already open transport.
    ///
    /// Runs the in-band login, synchronizes on the prompt, detects the OS if
    /// needed, and applies the vendor initialization sequence.
    pub async fn connect_with<T: Transport>(
        self,
        transport: T,
        in_band: InBandLogin,
    ) -> Result<Session<T>> {
        let mut channel = ExpectChannel::new(
            transport,
            self.config.search_depth,
            self.config.line_ending.clone(),
        );
        if let Some(sink) = self.mirror {
            channel.set_mirror(sink);
        }

        let enable_password = self
            .enable_password
            .unwrap_or_else(|| self.password.clone());
        let parts = SessionParts {
            hostname: self.hostname,
            ip: self.ip,
            device_type: self.device_type,
            method: self.method,
            username: self.username,
            password: SecretString::from(self.password),
            enable_password: SecretString::from(enable_password),
        };

        let mut session = Session::new(parts, self.config, channel)?;
        session.login(in_band).await?;
        session.synchronize().await?;

        let device_type = if self.detect_os || !session.device_type().is_known() {
            session.detect().await?
        } else {
            session.device_type()
        };
        session.initialize(device_type).await?;

        debug!("{}: session ready", session.target());
        Ok(session)
    }
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("hostname", &self.hostname)
            .field("ip", &self.ip)
            .field("device_type", &self.device_type)
            .field("method", &self.method)
            .field("username", &self.username)
            .field("proxy", &self.proxy)
            .field("detect_os", &self.detect_os)
            .finish_non_exhaustive()
    }
}
