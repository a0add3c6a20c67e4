//! Plugins available to the command line.

pub mod local;
pub mod shell;

use anyhow::{Context, Result};
use enactor::{Plugin, Registry};

/// Registry with the local resolver, the shell config manager and every
/// built-in health check
pub fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register(
        local::NAME,
        local::schema(),
        Plugin::resolver(local::LocalResolver::new()),
    )?;
    registry.register(
        shell::NAME,
        shell::schema(),
        Plugin::config_manager(shell::ShellConfig),
    )?;
    healthkit::register_builtin(&mut registry).context("Failed to register health checks")?;
    log::debug!("{} plugins registered", registry.len());
    Ok(registry)
}
