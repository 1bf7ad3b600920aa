//! Session engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::channel::patterns::{GENERIC_PROMPT, LOGIN_PROMPT, PAGINATION, PASSWORD_PROMPT};
use crate::transport::HostKeyVerification;

/// Longest wait a script or configuration may ask for, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Immutable settings for one session.
///
/// Prompt templates, timeouts and fixed commands all live here so that a
/// session never consults process-wide state.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait for the idle prompt after each command.
    pub command_timeout: Duration,

    /// Bound on each login step and on privilege elevation.
    pub login_timeout: Duration,

    /// Pause before sending a password.
    pub password_delay: Duration,

    /// Terminal width for the PTY / NAWS.
    pub terminal_width: u32,

    /// Terminal height for the PTY / NAWS.
    pub terminal_height: u32,

    /// How far back each incremental buffer search reaches.
    pub search_depth: usize,

    /// Idle-prompt pattern used until the first synchronization.
    pub prompt_pattern: String,

    /// In-band password prompt.
    pub password_pattern: String,

    /// In-band username prompt.
    pub login_pattern: String,

    /// Pager markers answered with a space during detection.
    pub pagination_pattern: String,

    /// Paging-disable command sent before detection.
    pub detect_pager_command: String,

    /// Version query used for detection.
    pub version_command: String,

    /// Privilege elevation command.
    pub enable_command: String,

    /// Command sent on disconnect.
    pub exit_command: String,

    /// Appended to every line sent.
    pub line_ending: String,

    /// SSH host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(45),
            login_timeout: Duration::from_secs(30),
            password_delay: Duration::from_secs(1),
            terminal_width: 511,
            terminal_height: 24,
            search_depth: 1000,
            prompt_pattern: GENERIC_PROMPT.to_string(),
            password_pattern: PASSWORD_PROMPT.to_string(),
            login_pattern: LOGIN_PROMPT.to_string(),
            pagination_pattern: PAGINATION.to_string(),
            detect_pager_command: "terminal length 0".to_string(),
            version_command: "show version".to_string(),
            enable_command: "enable".to_string(),
            exit_command: "exit".to_string(),
            line_ending: "\n".to_string(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

impl SessionConfig {
    /// Set the per-command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the login timeout.
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Set the pause before passwords.
    pub fn with_password_delay(mut self, delay: Duration) -> Self {
        self.password_delay = delay;
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set the SSH host key policy.
    pub fn with_host_key_verification(
        mut self,
        verification: HostKeyVerification,
        known_hosts_path: Option<PathBuf>,
    ) -> Self {
        self.host_key_verification = verification;
        self.known_hosts_path = known_hosts_path;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.command_timeout, Duration::from_secs(45));
        assert_eq!(config.login_timeout, Duration::from_secs(30));
        assert_eq!(config.password_delay, Duration::from_secs(1));
        assert_eq!((config.terminal_width, config.terminal_height), (511, 24));
        assert_eq!(config.version_command, "show version");
        assert_eq!(config.prompt_pattern, GENERIC_PROMPT);
    }

    #[test]
    fn test_builder_methods() {
        let config = SessionConfig::default()
            .with_command_timeout(Duration::from_secs(5))
            .with_terminal_size(132, 50);
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.terminal_width, 132);
    }
}
