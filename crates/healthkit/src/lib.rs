//! # Healthkit
//!
//! Built-in health checks for enactor.
//!
//! | name       | healthy when                                        |
//! |------------|-----------------------------------------------------|
//! | `ports`    | every port accepts a TCP connection                 |
//! | `services` | every named service answers (reason names the rest) |
//! | `urls`     | every URL answers a HEAD request                    |
//! | `command`  | a command run through the resolver exits 0          |
//! | `basic`    | `ports`, then `urls`                                |
//!
//! Every check polls until healthy or until its `timeout` (seconds, default
//! 0 = one attempt) elapses, sleeping `poll_delay` seconds (default 1)
//! between attempts.
//!
//! ```ignore
//! let mut registry = enactor::Registry::new();
//! healthkit::register_builtin(&mut registry)?;
//! ```

pub mod basic;
pub mod command;
pub mod error;
mod fields;
pub mod poll;
pub mod port;
pub mod service;
pub mod url;

pub use basic::BasicCheck;
pub use command::CommandCheck;
pub use error::{Error, Result};
pub use poll::{LogCallback, PollCallback, PollSettings, poll_until};
pub use port::PortsCheck;
pub use service::{Service, ServiceProbe, ServicesCheck, TcpProbe};
pub use url::UrlsCheck;

use enactor::{Plugin, Registry};

/// Register every built-in check under its default name
pub fn register_builtin(registry: &mut Registry) -> enactor::Result<()> {
    registry.register(port::NAME, port::schema(), Plugin::health_check(PortsCheck))?;
    registry.register(service::NAME, service::schema(), Plugin::health_check(ServicesCheck::new()))?;
    registry.register(url::NAME, url::schema(), Plugin::health_check(UrlsCheck::new()))?;
    registry.register(command::NAME, command::schema(), Plugin::health_check(CommandCheck))?;
    registry.register(basic::NAME, basic::schema(), Plugin::health_check(BasicCheck::new()))?;
    Ok(())
}
