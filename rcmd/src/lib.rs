//! # rcmd
//!
//! Scripted CLI sessions for network devices over SSH and Telnet.
//!
//! rcmd opens an interactive shell on a router, switch, firewall or load
//! balancer, works out what the idle prompt looks like, identifies the
//! operating system from its version banner, turns paging off, and then runs
//! a command script, handing back the output of every command.
//!
//! ## Features
//!
//! - SSH via russh, Telnet over raw TCP with option negotiation
//! - SOCKS4 relays for Telnet, OpenSSH-configured relays for SSH
//! - Prompt discovery and narrowing to the device hostname
//! - OS detection for IOS, NX-OS, EOS, JunOS, ACE and ASA/FWSM
//! - Bounded waits everywhere: every failure names its kind
//! - Inventory audits of device type, hostname and management IP
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rcmd::driver::SessionBuilder;
//! use rcmd::platform::DeviceType;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rcmd::Error> {
//!     let mut session = SessionBuilder::new("core1", "192.0.2.10")
//!         .device_type(DeviceType::Ios)
//!         .username("netops")
//!         .password("secret")
//!         .connect()
//!         .await?;
//!
//!     let script = ["show clock", "*", "configure terminal", "end"];
//!     for exchange in session.execute_script(script, |_| Ok(())).await? {
//!         println!("{}: {}", exchange.command, exchange.output);
//!     }
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod check;
pub mod driver;
pub mod error;
pub mod inventory;
pub mod platform;
pub mod transcript;
pub mod transport;

// Re-export main types for convenience
pub use driver::{Exchange, Session, SessionBuilder, SessionConfig};
pub use error::{Error, Result, TransportError};
pub use inventory::{Device, FileInventory, Inventory, ToolConfig};
pub use platform::DeviceType;
pub use transcript::Transcript;
pub use transport::ConnectionMethod;
