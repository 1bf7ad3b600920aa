//! OS classification from `show version` output.

use super::DeviceType;

/// Banner markers that identify one device type.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub device_type: DeviceType,
    pub markers: &'static [&'static str],
}

/// Signatures in precedence order; the first one with a marker present wins.
pub const SIGNATURES: &[Signature] = &[
    Signature {
        device_type: DeviceType::Junos,
        markers: &["JUNOS"],
    },
    Signature {
        device_type: DeviceType::Eos,
        markers: &["Arista"],
    },
    Signature {
        device_type: DeviceType::Ios,
        markers: &[
            "Cisco IOS Software",
            "Cisco Internetwork Operating System Software",
            "IOS (tm)",
        ],
    },
    Signature {
        device_type: DeviceType::Nxos,
        markers: &["Cisco Nexus Operating System", "NX-OS"],
    },
    Signature {
        device_type: DeviceType::Ace,
        markers: &["Cisco Application Control Software"],
    },
    Signature {
        device_type: DeviceType::Asa,
        markers: &[
            "Cisco Adaptive Security Appliance",
            "Firewall Services Module",
            "FWSM Firewall Version",
        ],
    },
];

/// Classify version output. Returns `None` when no signature matches.
pub fn classify(output: &str) -> Option<DeviceType> {
    SIGNATURES
        .iter()
        .find(|signature| signature.markers.iter().any(|m| output.contains(m)))
        .map(|signature| signature.device_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_banners() {
        let cases = [
            (
                "Cisco IOS Software, C3750E Software (C3750E-UNIVERSALK9-M), Version 15.0(2)SE",
                DeviceType::Ios,
            ),
            ("IOS (tm) C2950 Software (C2950-I6Q4L2-M)", DeviceType::Ios),
            (
                "Cisco Nexus Operating System (NX-OS) Software\r\nTAC support",
                DeviceType::Nxos,
            ),
            ("Arista DCS-7050TX-64-R\r\nSoftware image version: 4.20.1F", DeviceType::Eos),
            ("Hostname: mx960\r\nModel: mx960\r\nJUNOS Base OS boot [12.3R6.6]", DeviceType::Junos),
            ("Cisco Application Control Software (ACSW)", DeviceType::Ace),
            ("FWSM Firewall Version 4.1(5)", DeviceType::Asa),
        ];

        for (banner, expected) in cases {
            assert_eq!(classify(banner), Some(expected), "{banner}");
        }
    }

    #[test]
    fn test_asa_precedence_over_generic_cisco() {
        let banner = "Cisco Adaptive Security Appliance Software Version 9.8(2)\r\n\
                      Compiled on Fri 04-Aug-17 by builders\r\n\
                      cisco ASA5525 with 8192 MB RAM";
        assert_eq!(classify(banner), Some(DeviceType::Asa));
    }

    #[test]
    fn test_junos_wins_over_later_markers() {
        let banner = "JUNOS Software Release [15.1]\r\nNX-OS compatible";
        assert_eq!(classify(banner), Some(DeviceType::Junos));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(classify("Linux box 5.15.0-91-generic"), None);
        assert_eq!(classify(""), None);
    }
}
