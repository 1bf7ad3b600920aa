//! Device sessions.
//!
//! A [`Session`] is built by [`SessionBuilder`]: it opens the transport,
//! finishes the login, synchronizes on the idle prompt, detects the device
//! OS when needed, and runs the vendor initialization sequence. Commands and
//! whole scripts then run against the synchronized prompt.

mod builder;
pub mod config;
pub mod directive;
mod executor;
pub mod response;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use builder::SessionBuilder;
pub use config::SessionConfig;
pub use directive::{Directive, TimedExchange};
pub use response::{Exchange, extract_output};
pub use session::Session;
