//! Inventory audits: compare a record against what the device reports.

use std::fmt;

use crate::inventory::Device;
use crate::platform::DeviceType;

/// Result of one audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// Whether the record agrees with the device.
    pub passed: bool,
    message: String,
}

impl Check {
    fn pass(message: String) -> Self {
        Self {
            passed: true,
            message,
        }
    }

    fn fail(message: String) -> Self {
        Self {
            passed: false,
            message,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Recorded device type against the detected one.
pub fn device_type(device: &Device, detected: DeviceType) -> Check {
    let detected_code = detected.code().to_string();
    if device.type_code == detected_code {
        Check::pass(format!("{} - {} - OK", device.hostname, detected_code))
    } else {
        Check::fail(format!(
            "{} - Device type mismatch (DB == {} but detected == {})",
            device.hostname, device.type_code, detected_code
        ))
    }
}

/// Recorded hostname against the one in the prompt, ignoring case.
pub fn hostname(device: &Device, detected: Option<&str>) -> Check {
    let recorded = device.hostname.to_uppercase();
    let detected = detected.unwrap_or_default().to_uppercase();
    if recorded == detected {
        Check::pass(format!("{} - OK", device.hostname))
    } else {
        Check::fail(format!(
            "{recorded} - Hostname mismatch (DB == {recorded} but detected == {detected})"
        ))
    }
}

/// Recorded management IP against an expected one.
pub fn management_ip(device: &Device, expected: &str) -> Check {
    if device.ip == expected {
        Check::pass(format!("{} OK", device.hostname))
    } else {
        Check::fail(format!(
            "{} mgmtip == {}, dev.ip == {}",
            device.hostname, expected, device.ip
        ))
    }
}
