//! Platform knowledge: device types, OS signatures and vendor setup.
//!
//! Device types are a closed set identified by single-character codes in the
//! inventory. The classifier maps a version banner to a type; the vendor
//! table maps a type to the commands that make its CLI scriptable.

pub mod detect;
pub mod vendors;

use std::fmt;

use serde::{Serialize, Serializer};

pub use detect::{SIGNATURES, Signature, classify};
pub use vendors::{InitStep, init_steps};

/// Operating system family of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    /// Cisco IOS / IOS-XE (`C`).
    Ios,
    /// Cisco NX-OS (`N`).
    Nxos,
    /// Arista EOS (`E`).
    Eos,
    /// Juniper JunOS (`J`).
    Junos,
    /// Cisco ACE load balancer (`A`).
    Ace,
    /// Cisco ASA or FWSM firewall (`F`).
    Asa,
    /// Linux host (`L`).
    Linux,
    /// F5 BIG-IP TMOS (`B`).
    Tmos,
    /// Palo Alto PAN-OS (`P`).
    PanOs,
    /// Not known yet; resolved by detection.
    #[default]
    Unknown,
}

impl DeviceType {
    /// Every known type, in code order.
    pub const KNOWN: [DeviceType; 9] = [
        Self::Ios,
        Self::Nxos,
        Self::Eos,
        Self::Junos,
        Self::Ace,
        Self::Asa,
        Self::Linux,
        Self::Tmos,
        Self::PanOs,
    ];

    /// Parse the single-character inventory code. Unrecognized codes are
    /// `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "C" => Self::Ios,
            "N" => Self::Nxos,
            "E" => Self::Eos,
            "J" => Self::Junos,
            "A" => Self::Ace,
            "F" => Self::Asa,
            "L" => Self::Linux,
            "B" => Self::Tmos,
            "P" => Self::PanOs,
            _ => Self::Unknown,
        }
    }

    /// The single-character inventory code.
    pub const fn code(self) -> char {
        match self {
            Self::Ios => 'C',
            Self::Nxos => 'N',
            Self::Eos => 'E',
            Self::Junos => 'J',
            Self::Ace => 'A',
            Self::Asa => 'F',
            Self::Linux => 'L',
            Self::Tmos => 'B',
            Self::PanOs => 'P',
            Self::Unknown => 'U',
        }
    }

    /// Human readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ios => "IOS",
            Self::Nxos => "NXOS",
            Self::Eos => "EOS",
            Self::Junos => "JunOS",
            Self::Ace => "ACE",
            Self::Asa => "ASA/FWSM",
            Self::Linux => "Linux",
            Self::Tmos => "TMOS",
            Self::PanOs => "PAN-OS",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the type is resolved.
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for DeviceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for device_type in DeviceType::KNOWN {
            let code = device_type.code().to_string();
            assert_eq!(DeviceType::from_code(&code), device_type);
            assert!(device_type.is_known());
        }
    }

    #[test]
    fn test_unrecognized_code_is_unknown() {
        assert_eq!(DeviceType::from_code("X"), DeviceType::Unknown);
        assert_eq!(DeviceType::from_code(""), DeviceType::Unknown);
        assert!(!DeviceType::Unknown.is_known());
    }

    #[test]
    fn test_display_is_code() {
        assert_eq!(DeviceType::Asa.to_string(), "F");
        assert_eq!(DeviceType::Asa.name(), "ASA/FWSM");
    }
}
