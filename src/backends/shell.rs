//! Config management by running shell commands on the node.

use anyhow::Result;
use enactor::{CallContext, ConfigManager, FieldType, NodeHandle, Schema, Section};
use serde_json::Value;

pub const NAME: &str = "shell";

const DEFAULT_SHELL: &str = "sh";

pub fn schema() -> Schema {
    Schema::new()
        .required("commands", FieldType::list(FieldType::String))
        .optional("undo_commands", FieldType::list(FieldType::String))
        .optional("shell", FieldType::String)
}

/// Runs `commands` in order through the node's resolver, each as
/// `<shell> -c <command>`; the first failing command fails the stage.
///
/// Rollback runs `undo_commands` the same way. A section without them has
/// nothing to revert.
#[derive(Debug, Default)]
pub struct ShellConfig;

fn strings(section: &Section, key: &str) -> Vec<String> {
    section
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn run_all(node: &NodeHandle, section: &Section, key: &str, ctx: &CallContext) -> Result<()> {
    let shell = section
        .get("shell")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_SHELL);
    for command in strings(section, key) {
        if ctx.should_stop() {
            anyhow::bail!("stopped before '{command}'");
        }
        log::debug!("{}: {shell} -c {command}", node.name());
        node.cmd_checked(Some(shell), &["-c".to_string(), command], ctx)?;
    }
    Ok(())
}

impl ConfigManager for ShellConfig {
    fn apply(&self, node: &NodeHandle, section: &Section, ctx: &CallContext) -> Result<()> {
        run_all(node, section, "commands", ctx)
    }

    fn supports_undo(&self) -> bool {
        true
    }

    fn undo(&self, node: &NodeHandle, section: &Section, ctx: &CallContext) -> Result<()> {
        if section.get("undo_commands").is_none() {
            log::info!("{}: no undo_commands, nothing to revert", node.name());
            return Ok(());
        }
        run_all(node, section, "undo_commands", ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::local::LocalResolver;
    use crate::backends::tests::requests;
    use enactor::Resolver;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn local_node() -> NodeHandle {
        let resolver = LocalResolver::new();
        let node = resolver
            .create(&requests("")[0], &CallContext::default())
            .unwrap();
        NodeHandle::new(node, Arc::new(resolver))
    }

    #[test]
    fn test_commands_run_in_order() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("log");
        let section = Section::new(NAME).with(
            "commands",
            json!([
                format!("echo one >> {}", log.display()),
                format!("echo two >> {}", log.display()),
            ]),
        );
        ShellConfig
            .apply(&local_node(), &section, &CallContext::default())
            .unwrap();
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_failing_command_stops_the_stage() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        let section = Section::new(NAME).with(
            "commands",
            json!(["echo broken >&2; exit 1", format!("touch {}", marker.display())]),
        );
        let err = ShellConfig
            .apply(&local_node(), &section, &CallContext::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("broken"));
        assert!(!marker.exists());
    }

    #[test]
    fn test_undo() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("marker");
        std::fs::write(&marker, "").unwrap();

        let without = Section::new(NAME).with("commands", json!(["true"]));
        ShellConfig
            .undo(&local_node(), &without, &CallContext::default())
            .unwrap();
        assert!(marker.exists());

        let with = without.with("undo_commands", json!([format!("rm {}", marker.display())]));
        ShellConfig
            .undo(&local_node(), &with, &CallContext::default())
            .unwrap();
        assert!(!marker.exists());
    }
}
