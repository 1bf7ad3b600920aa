//! A connected, synchronized device session.

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use super::config::SessionConfig;
use super::directive::TimedExchange;
use super::response::Exchange;
use crate::channel::{ExpectChannel, ExpectOutcome, Matched, PromptPattern};
use crate::error::{Error, Result};
use crate::platform::{DeviceType, InitStep, classify, init_steps};
use crate::transport::{AnyTransport, ConnectionMethod, InBandLogin, Transport};

/// Identity and credentials handed over by the builder.
pub(crate) struct SessionParts {
    pub hostname: String,
    pub ip: String,
    pub device_type: DeviceType,
    pub method: ConnectionMethod,
    pub username: String,
    pub password: SecretString,
    pub enable_password: SecretString,
}

/// An interactive CLI session on one device.
///
/// Obtained from [`SessionBuilder::connect`](super::SessionBuilder::connect),
/// which only returns once login and the first prompt synchronization have
/// succeeded. Every wait is bounded; any failure is fatal to the session.
pub struct Session<T: Transport = AnyTransport> {
    hostname: String,
    ip: String,
    device_type: DeviceType,
    method: ConnectionMethod,
    username: String,
    password: SecretString,
    enable_password: SecretString,

    config: SessionConfig,
    channel: ExpectChannel<T>,

    /// Current idle-prompt pattern.
    prompt: PromptPattern,
    /// Pattern restored by `reset_prompt`.
    base_prompt: PromptPattern,
    /// Last prompt text seen, without the line anchor.
    prompt_text: String,

    login_pattern: Regex,
    password_pattern: Regex,
    pagination_pattern: Regex,

    last_output: String,
    connected: bool,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(
        parts: SessionParts,
        config: SessionConfig,
        channel: ExpectChannel<T>,
    ) -> Result<Self> {
        let base_prompt = PromptPattern::new(config.prompt_pattern.clone())?;
        Ok(Self {
            hostname: parts.hostname,
            ip: parts.ip,
            device_type: parts.device_type,
            method: parts.method,
            username: parts.username,
            password: parts.password,
            enable_password: parts.enable_password,
            login_pattern: Regex::new(&config.login_pattern)?,
            password_pattern: Regex::new(&config.password_pattern)?,
            pagination_pattern: Regex::new(&config.pagination_pattern)?,
            prompt: base_prompt.clone(),
            base_prompt,
            prompt_text: String::new(),
            config,
            channel,
            last_output: String::new(),
            connected: false,
        })
    }

    /// Finish whatever login the transport left to the terminal, then wait
    /// for the first idle prompt.
    pub(crate) async fn login(&mut self, in_band: InBandLogin) -> Result<()> {
        let prompt = self.prompt.regex().clone();
        let password = self.password_pattern.clone();

        let at_prompt = match in_band {
            InBandLogin::None => false,
            InBandLogin::Password => {
                // some servers skip the password prompt entirely
                let matched = self.wait_login(&[&password, &prompt]).await?;
                match matched.index {
                    0 => {
                        self.send_password(false).await?;
                        false
                    }
                    1 => {
                        self.record_prompt(&matched.matched);
                        true
                    }
                    index => return Err(Error::UnknownExpectOutcome { index }),
                }
            }
            InBandLogin::UsernameAndPassword => {
                let login = self.login_pattern.clone();
                self.wait_login(&[&login]).await?;
                let username = self.username.clone();
                self.channel.send_line(&username).await?;

                self.wait_login(&[&password]).await?;
                self.send_password(false).await?;
                false
            }
        };

        if !at_prompt {
            let matched = self.wait_login(&[&prompt]).await?;
            self.record_prompt(&matched.matched);
        }

        self.connected = true;
        debug!("{}: logged in", self.hostname);
        Ok(())
    }

    /// Determine the idle prompt and narrow the pattern to the host prefix.
    pub async fn synchronize(&mut self) -> Result<()> {
        self.channel.clear();
        self.channel.send_line("").await?;

        let prompt = self.prompt.regex().clone();
        let timeout = self.config.command_timeout;
        let matched = self.wait_command(&[&prompt], "", timeout).await?;
        self.record_prompt(&matched.matched);

        if let Some(narrowed) = PromptPattern::narrow(&matched.matched)? {
            if narrowed != self.prompt {
                debug!("{}: prompt pattern now {}", self.hostname, narrowed.as_str());
                self.prompt = narrowed;
            }
        }
        Ok(())
    }

    /// Go back to the generic prompt pattern. Call `synchronize` afterwards.
    pub fn reset_prompt(&mut self) {
        trace!("{}: prompt pattern reset", self.hostname);
        self.prompt = self.base_prompt.clone();
    }

    /// Classify the device from its version output.
    ///
    /// Pager prompts are answered with a space until the idle prompt shows
    /// up. The detected type replaces the session's device type.
    pub async fn detect(&mut self) -> Result<DeviceType> {
        let pager_command = self.config.detect_pager_command.clone();
        self.run_command(&pager_command).await?;

        let version_command = self.config.version_command.clone();
        debug!("{}: sending '{}'", self.hostname, version_command);
        self.channel.send_line(&version_command).await?;

        let prompt = self.prompt.regex().clone();
        let pager = self.pagination_pattern.clone();
        let timeout = self.config.command_timeout;
        let mut text = String::new();

        loop {
            let matched = self
                .wait_command(&[&prompt, &pager], &version_command, timeout)
                .await?;
            text.push_str(&matched.before);
            match matched.index {
                0 => break,
                1 => {
                    trace!("{}: paginating", self.hostname);
                    self.channel.send(b" ").await?;
                }
                index => return Err(Error::UnknownExpectOutcome { index }),
            }
        }

        let device_type = classify(&text).ok_or(Error::UnknownDeviceType)?;
        debug!("{}: detected {}", self.hostname, device_type.name());
        self.last_output = text;
        self.device_type = device_type;
        Ok(device_type)
    }

    /// Run the vendor setup sequence for `device_type`.
    pub async fn initialize(&mut self, device_type: DeviceType) -> Result<()> {
        let steps = init_steps(device_type).ok_or(Error::UnknownDeviceType)?;
        debug!(
            "{}: initializing as {} ({} steps)",
            self.hostname,
            device_type.name(),
            steps.len()
        );

        for step in steps {
            match *step {
                InitStep::Command(command) => {
                    self.run_command(command).await?;
                }
                InitStep::Raw(data) => self.channel.send(data.as_bytes()).await?,
                InitStep::Elevate => self.elevate().await?,
            }
        }
        self.device_type = device_type;
        Ok(())
    }

    /// Enter privileged mode, answering the password prompt only if asked.
    async fn elevate(&mut self) -> Result<()> {
        let enable = self.config.enable_command.clone();
        debug!("{}: sending '{}'", self.hostname, enable);
        self.channel.send_line(&enable).await?;

        let password = self.password_pattern.clone();
        let prompt = self.prompt.regex().clone();
        let timeout = self.config.login_timeout;
        let matched = self
            .wait_command(&[&password, &prompt], &enable, timeout)
            .await?;

        match matched.index {
            0 => {
                self.send_password(true).await?;
                let timeout = self.config.command_timeout;
                self.wait_command(&[&prompt], &enable, timeout).await?;
                Ok(())
            }
            1 => Ok(()),
            index => Err(Error::UnknownExpectOutcome { index }),
        }
    }

    /// Send a command and capture its output up to the next idle prompt.
    pub async fn send_command(&mut self, command: &str) -> Result<Exchange> {
        let started = Instant::now();
        let matched = self.run_command(command).await?;
        Ok(Exchange::new(command, matched.before, started.elapsed()))
    }

    /// Send `timed.send` and wait for `timed.expect` instead of the prompt.
    pub async fn timed_exchange(&mut self, timed: &TimedExchange) -> Result<Exchange> {
        let started = Instant::now();
        debug!(
            "{}: sending '{}', expecting /{}/",
            self.hostname,
            timed.send,
            timed.expect.as_str()
        );
        self.channel.send_line(&timed.send).await?;
        let matched = self
            .wait_command(&[&timed.expect], &timed.send, timed.timeout)
            .await?;
        self.last_output = matched.before.clone();
        Ok(Exchange::new(&timed.send, matched.before, started.elapsed()))
    }

    async fn run_command(&mut self, command: &str) -> Result<Matched> {
        debug!("{}: sending '{}'", self.hostname, command);
        self.channel.send_line(command).await?;

        let prompt = self.prompt.regex().clone();
        let timeout = self.config.command_timeout;
        let matched = self.wait_command(&[&prompt], command, timeout).await?;
        self.last_output = matched.before.clone();
        Ok(matched)
    }

    /// Send the exit command and drop the transport. Best effort; nothing
    /// is awaited from the device.
    pub async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        let exit = self.config.exit_command.clone();
        if let Err(e) = self.channel.send_line(&exit).await {
            debug!("{}: exit not sent: {}", self.hostname, e);
        }
        if let Err(e) = self.channel.close().await {
            debug!("{}: close failed: {}", self.hostname, e);
        }
        debug!("{}: disconnected", self.hostname);
    }

    async fn send_password(&mut self, enable: bool) -> Result<()> {
        tokio::time::sleep(self.config.password_delay).await;
        let secret = if enable {
            self.enable_password.expose_secret().to_string()
        } else {
            self.password.expose_secret().to_string()
        };
        trace!("{}: sending password", self.hostname);
        self.channel.send_line(&secret).await?;
        Ok(())
    }

    async fn wait_login(&mut self, patterns: &[&Regex]) -> Result<Matched> {
        let timeout = self.config.login_timeout;
        match self.channel.expect(patterns, timeout).await? {
            ExpectOutcome::Matched(matched) => Ok(matched),
            ExpectOutcome::Eof { .. } => Err(Error::AuthenticationEof),
            ExpectOutcome::Timeout { .. } => Err(Error::AuthenticationTimeout(timeout)),
        }
    }

    async fn wait_command(
        &mut self,
        patterns: &[&Regex],
        command: &str,
        timeout: Duration,
    ) -> Result<Matched> {
        match self.channel.expect(patterns, timeout).await? {
            ExpectOutcome::Matched(matched) => Ok(matched),
            ExpectOutcome::Eof { .. } => Err(Error::CommandEof {
                command: command.to_string(),
            }),
            ExpectOutcome::Timeout { .. } => Err(Error::CommandTimeout {
                command: command.to_string(),
                timeout,
            }),
        }
    }

    fn record_prompt(&mut self, matched: &str) {
        self.prompt_text = matched.trim_start_matches(['\r', '\n']).to_string();
    }

    /// Copy every received chunk to `sink`.
    pub fn set_mirror(&mut self, sink: Box<dyn std::io::Write + Send>) {
        self.channel.set_mirror(sink);
    }

    /// Inventory hostname.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Management address.
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// `hostname (ip)`, as used in diagnostics and the transcript trailer.
    pub fn target(&self) -> String {
        format!("{} ({})", self.hostname, self.ip)
    }

    /// Current device type.
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Connection method in use.
    pub fn method(&self) -> ConnectionMethod {
        self.method
    }

    /// Current idle-prompt pattern.
    pub fn prompt(&self) -> &PromptPattern {
        &self.prompt
    }

    /// Last prompt text seen.
    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    /// Hostname as the device reports it in its prompt.
    ///
    /// For `user@host` prompts only the part after `@` is returned.
    pub fn detected_hostname(&self) -> Option<&str> {
        let prefix = PromptPattern::host_prefix(&self.prompt_text)?;
        let host = prefix.rsplit('@').next().unwrap_or(prefix);
        let host = host.split(':').next().unwrap_or(host);
        (!host.is_empty()).then_some(host)
    }

    /// Raw text captured by the most recent wait.
    pub fn last_output(&self) -> &str {
        &self.last_output
    }

    /// Whether the session is logged in and not yet disconnected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Per-command timeout.
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.config.command_timeout = timeout;
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("hostname", &self.hostname)
            .field("ip", &self.ip)
            .field("device_type", &self.device_type)
            .field("method", &self.method)
            .field("username", &self.username)
            .field("prompt", &self.prompt)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}
