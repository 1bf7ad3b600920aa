//! Tool configuration file.
//!
//! ```toml
//! [inventory]
//! path = "devices.csv"
//!
//! [defaults]
//! timeout = 45
//!
//! [auth.1]
//! username = "netops"
//! password = "secret"
//!
//! [auth.2]
//! include_auth = 1
//! enable_password = "other"
//!
//! [proxy.1]
//! server = "relay.example.net"
//! port = 1080
//! sshconfig = "/etc/rcmd/ssh_config.relay"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use log::debug;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{Device, FileInventory};
use crate::driver::config::MAX_TIMEOUT_SECS;
use crate::driver::{SessionBuilder, SessionConfig};
use crate::error::{Error, Result};
use crate::transport::ProxyConfig;

/// Default per-command timeout in seconds.
pub const DEFAULT_TIMEOUT: u64 = 45;

#[derive(Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    inventory: Option<RawInventory>,
    #[serde(default)]
    defaults: RawDefaults,
    #[serde(default)]
    auth: BTreeMap<String, RawAuth>,
    #[serde(default)]
    proxy: BTreeMap<String, RawProxy>,
}

#[derive(Debug, Deserialize)]
struct RawInventory {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct RawDefaults {
    timeout: Option<u64>,
}

#[derive(Deserialize)]
struct RawAuth {
    username: Option<String>,
    password: Option<String>,
    enable_password: Option<String>,
    include_auth: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawProxy {
    server: String,
    port: u16,
    sshconfig: PathBuf,
}

struct AuthEntry {
    username: Option<String>,
    password: Option<SecretString>,
    enable_password: Option<SecretString>,
    include_auth: Option<u32>,
}

/// Resolved login credentials.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    /// Defaults to the login password.
    pub enable_password: SecretString,
}

/// Parsed tool configuration.
pub struct ToolConfig {
    inventory_path: Option<PathBuf>,
    timeout: Duration,
    auth: IndexMap<u32, AuthEntry>,
    proxies: IndexMap<u32, ProxyConfig>,
}

impl ToolConfig {
    /// Load a configuration file. A relative inventory path is resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::parse(&content, base).map_err(|e| match e {
            Error::Config { message } => {
                Error::config(format!("{}: {}", path.display(), message))
            }
            other => other,
        })?;
        debug!(
            "loaded {}: {} auth, {} proxy sections",
            path.display(),
            config.auth.len(),
            config.proxies.len()
        );
        Ok(config)
    }

    /// Parse configuration text, resolving relative paths against `base`.
    pub fn parse(content: &str, base: &Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;

        let mut auth = IndexMap::new();
        for (key, section) in raw.auth {
            auth.insert(
                section_id("auth", &key)?,
                AuthEntry {
                    username: section.username,
                    password: section.password.map(SecretString::from),
                    enable_password: section.enable_password.map(SecretString::from),
                    include_auth: section.include_auth,
                },
            );
        }

        let mut proxies = IndexMap::new();
        for (key, section) in raw.proxy {
            let id = section_id("proxy", &key)?;
            if id == 0 {
                return Err(Error::config("proxy.0 is reserved for direct connections"));
            }
            proxies.insert(
                id,
                ProxyConfig {
                    server: section.server,
                    port: section.port,
                    ssh_config: section.sshconfig,
                },
            );
        }

        proxies.sort_keys();

        let timeout = raw.defaults.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout > MAX_TIMEOUT_SECS {
            return Err(Error::config(format!(
                "defaults.timeout {timeout} exceeds {MAX_TIMEOUT_SECS} seconds"
            )));
        }

        Ok(Self {
            inventory_path: raw.inventory.map(|inv| base.join(inv.path)),
            timeout: Duration::from_secs(timeout),
            auth,
            proxies,
        })
    }

    /// Inventory file location, if configured.
    pub fn inventory_path(&self) -> Option<&Path> {
        self.inventory_path.as_deref()
    }

    /// Load the configured inventory file.
    pub fn load_inventory(&self) -> Result<FileInventory> {
        let path = self
            .inventory_path
            .as_deref()
            .ok_or_else(|| Error::config("no [inventory] path configured"))?;
        FileInventory::load(path)
    }

    /// Default per-command timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Session settings derived from `[defaults]`.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default().with_command_timeout(self.timeout)
    }

    /// Resolve the credentials for `auth_id`.
    ///
    /// With `include_auth` the username and password come from the
    /// referenced section; the enable password still comes from this one.
    pub fn credentials(&self, auth_id: u32) -> Result<Credentials> {
        let entry = self.auth_entry(auth_id)?;

        let login = match entry.include_auth {
            Some(included) => {
                let base = self.auth_entry(included)?;
                if base.include_auth.is_some() {
                    return Err(Error::config(format!(
                        "auth.{included} is included by auth.{auth_id} and may not include another section"
                    )));
                }
                base
            }
            None => entry,
        };

        let username = login
            .username
            .clone()
            .ok_or_else(|| Error::config(format!("auth.{auth_id}: no username")))?;
        let password = login
            .password
            .as_ref()
            .ok_or_else(|| Error::config(format!("auth.{auth_id}: no password")))?;

        let enable_password = entry.enable_password.as_ref().unwrap_or(password);

        Ok(Credentials {
            username,
            password: copy_secret(password),
            enable_password: copy_secret(enable_password),
        })
    }

    /// Relay for `proxy_id`; 0 means a direct connection.
    pub fn proxy(&self, proxy_id: u32) -> Result<Option<ProxyConfig>> {
        if proxy_id == 0 {
            return Ok(None);
        }
        self.proxies
            .get(&proxy_id)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::config(format!("proxy.{proxy_id} not found")))
    }

    /// Configured proxy ids, ascending.
    pub fn proxy_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.proxies.keys().copied()
    }

    /// A session builder for `device` with its credentials and relay.
    pub fn session_builder(&self, device: &Device) -> Result<SessionBuilder> {
        let method = device.method()?;
        let credentials = self.credentials(device.auth_id)?;
        let proxy = self.proxy(device.proxy_id)?;

        Ok(SessionBuilder::new(&device.hostname, &device.ip)
            .device_type(device.device_type)
            .method(method)
            .username(credentials.username)
            .password(credentials.password.expose_secret())
            .enable_password(credentials.enable_password.expose_secret())
            .proxy(proxy)
            .config(self.session_config()))
    }

    fn auth_entry(&self, auth_id: u32) -> Result<&AuthEntry> {
        self.auth
            .get(&auth_id)
            .ok_or_else(|| Error::config(format!("auth.{auth_id} not found")))
    }
}

impl std::fmt::Debug for ToolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolConfig")
            .field("inventory_path", &self.inventory_path)
            .field("timeout", &self.timeout)
            .field("auth", &self.auth.keys().collect::<Vec<_>>())
            .field("proxies", &self.proxies)
            .finish()
    }
}

fn section_id(table: &str, key: &str) -> Result<u32> {
    key.parse()
        .map_err(|_| Error::config(format!("[{table}.{key}]: section name must be a number")))
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}
