//! Vendor initialization table.
//!
//! Each device type gets a fixed sequence that turns off paging and widens
//! the terminal, so scripted output arrives unbroken.

use super::DeviceType;

/// One initialization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    /// Send a line and wait for the idle prompt.
    Command(&'static str),
    /// Send bytes as-is, without a line ending and without waiting.
    Raw(&'static str),
    /// Enter privileged mode, answering the enable password prompt if one
    /// appears.
    Elevate,
}

const CISCO_LIKE: &[InitStep] = &[
    InitStep::Command("terminal length 0"),
    InitStep::Command("terminal width 511"),
];

const JUNOS: &[InitStep] = &[
    InitStep::Command("set cli screen-length 0"),
    InitStep::Command("set cli screen-width 1024"),
    // leave any pager the width change may have opened
    InitStep::Raw("\x1b"),
    InitStep::Raw("q"),
    InitStep::Command(""),
];

const ASA: &[InitStep] = &[InitStep::Elevate, InitStep::Command("terminal pager 0")];

const TMOS: &[InitStep] = &[InitStep::Command(
    "modify cli preference pager disabled display-threshold 0",
)];

const PAN_OS: &[InitStep] = &[
    InitStep::Command("set cli pager off"),
    InitStep::Command("set cli terminal width 500"),
];

/// Initialization steps for `device_type`, or `None` for `Unknown`.
pub fn init_steps(device_type: DeviceType) -> Option<&'static [InitStep]> {
    match device_type {
        DeviceType::Ios | DeviceType::Nxos | DeviceType::Eos | DeviceType::Ace => Some(CISCO_LIKE),
        DeviceType::Junos => Some(JUNOS),
        DeviceType::Asa => Some(ASA),
        DeviceType::Tmos => Some(TMOS),
        DeviceType::PanOs => Some(PAN_OS),
        DeviceType::Linux => Some(&[]),
        DeviceType::Unknown => None,
    }
}
