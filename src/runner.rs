use anyhow::{Context, Result};
use enactor::CommandOutput;
use std::process::{Command, Stdio};

/// Run a command and capture its output, whatever its exit status
pub fn run_output(cmd: &str, args: &[String]) -> Result<CommandOutput> {
    log::debug!("running {} {}", cmd, args.join(" "));
    let output = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;
    Ok(output.into())
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    run_quiet("which", &[cmd])
}
