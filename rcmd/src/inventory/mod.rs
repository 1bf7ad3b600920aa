//! Device inventory and tool configuration.
//!
//! Devices are described in custom-host syntax,
//! `hostname,ip,devicetype,connmethod,proxyid,authid`, either one per line in
//! an inventory file or directly on the command line.

pub mod config;

use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::platform::DeviceType;
use crate::transport::ConnectionMethod;

pub use config::{Credentials, ToolConfig};

/// One device record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub hostname: String,
    pub ip: String,
    pub device_type: DeviceType,
    /// Device type code as recorded, even when it is not one rcmd knows.
    pub type_code: String,
    /// Connection method code as recorded. Validated by [`Device::method`].
    pub connection: String,
    /// Relay section in the tool configuration; 0 means direct.
    pub proxy_id: u32,
    /// Credentials section in the tool configuration.
    pub auth_id: u32,
}

impl Device {
    /// A device record with canonical codes.
    pub fn new(
        hostname: impl Into<String>,
        ip: impl Into<String>,
        device_type: DeviceType,
        method: ConnectionMethod,
        proxy_id: u32,
        auth_id: u32,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            ip: ip.into(),
            device_type,
            type_code: device_type.code().to_string(),
            connection: method.code().to_string(),
            proxy_id,
            auth_id,
        }
    }

    /// Parse a `hostname,ip,devicetype,connmethod,proxyid,authid` line.
    ///
    /// Unknown device type codes are accepted as `Unknown`; the connection
    /// method code is only checked when the session is spawned.
    pub fn parse_custom(record: &str) -> Result<Self> {
        let fields: Vec<&str> = record.split(',').map(str::trim).collect();
        let [hostname, ip, device_type, connection, proxy_id, auth_id] = fields.as_slice() else {
            return Err(Error::config(format!(
                "expected hostname,ip,devicetype,connmethod,proxyid,authid: '{record}'"
            )));
        };

        if hostname.is_empty() || ip.is_empty() {
            return Err(Error::config(format!("missing hostname or ip: '{record}'")));
        }

        let id = |field: &str, name: &str| {
            field
                .parse::<u32>()
                .map_err(|_| Error::config(format!("{name} '{field}' is not a number: '{record}'")))
        };

        Ok(Self {
            hostname: hostname.to_string(),
            ip: ip.to_string(),
            device_type: DeviceType::from_code(device_type),
            type_code: device_type.to_string(),
            connection: connection.to_string(),
            proxy_id: id(*proxy_id, "proxy id")?,
            auth_id: id(*auth_id, "auth id")?,
        })
    }

    /// The connection method, or `UnknownConnectionMethod`.
    pub fn method(&self) -> Result<ConnectionMethod> {
        ConnectionMethod::from_code(&self.connection)
    }
}

/// Custom-host syntax.
impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.hostname, self.ip, self.type_code, self.connection, self.proxy_id, self.auth_id
        )
    }
}

/// Device lookups.
pub trait Inventory {
    /// Find a device by hostname, ignoring case.
    fn lookup(&self, hostname: &str) -> Result<Device>;

    /// All devices whose hostname contains every term, ordered by hostname.
    fn search(&self, terms: &[&str]) -> Vec<Device>;
}

/// Resolve search terms to a single device.
///
/// One match is returned as is. Several matches are listed on `output` as a
/// numbered menu and the choice is read from `input`: an empty line picks the
/// first entry, `q` quits.
pub fn select<I, R, W>(inventory: &I, terms: &[&str], mut input: R, mut output: W) -> Result<Device>
where
    I: Inventory + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut matches = inventory.search(terms);
    match matches.len() {
        0 => {
            return Err(Error::DeviceNotFound {
                host: terms.join(" "),
            });
        }
        1 => return Ok(matches.remove(0)),
        _ => {}
    }

    for (index, device) in matches.iter().enumerate() {
        let method = device.method().map(|m| m.name()).unwrap_or("Unknown");
        writeln!(
            output,
            "{:>4}) {:<28} {:<16} {}",
            index + 1,
            device.hostname,
            device.ip,
            method
        )?;
    }
    write!(output, "Enter selection (default is 1, q to quit): ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim();
    if answer == "q" {
        return Err(Error::SelectionCancelled);
    }

    let choice = if answer.is_empty() {
        1
    } else {
        answer.parse::<usize>().map_err(|_| Error::InvalidSelection {
            input: answer.to_string(),
        })?
    };
    if choice == 0 || choice > matches.len() {
        return Err(Error::InvalidSelection {
            input: answer.to_string(),
        });
    }

    debug!("selected {} of {} matches", choice, matches.len());
    Ok(matches.swap_remove(choice - 1))
}

/// Inventory read from a file of custom-host lines.
#[derive(Debug, Clone, Default)]
pub struct FileInventory {
    /// Keyed by lowercased hostname.
    devices: IndexMap<String, Device>,
}

impl FileInventory {
    /// Load an inventory file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read inventory {}: {}", path.display(), e))
        })?;
        let inventory = Self::parse(&content)?;
        debug!(
            "loaded {} devices from {}",
            inventory.devices.len(),
            path.display()
        );
        Ok(inventory)
    }

    /// Parse inventory text. `#` comments and blank lines are skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let mut devices = IndexMap::new();

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let device = Device::parse_custom(line).map_err(|e| match e {
                Error::Config { message } => {
                    Error::config(format!("inventory line {}: {}", number + 1, message))
                }
                other => other,
            })?;
            let key = device.hostname.to_lowercase();
            if devices.contains_key(&key) {
                warn!(
                    "inventory line {}: duplicate host '{}' ignored",
                    number + 1,
                    device.hostname
                );
                continue;
            }
            devices.insert(key, device);
        }

        Ok(Self { devices })
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Check whether the inventory has no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Inventory for FileInventory {
    fn lookup(&self, hostname: &str) -> Result<Device> {
        self.devices
            .get(&hostname.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound {
                host: hostname.to_string(),
            })
    }

    fn search(&self, terms: &[&str]) -> Vec<Device> {
        let terms: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
        let mut found: Vec<Device> = self
            .devices
            .iter()
            .filter(|(key, _)| terms.iter().all(|term| key.contains(term.as_str())))
            .map(|(_, device)| device.clone())
            .collect();
        found.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        found
    }
}
