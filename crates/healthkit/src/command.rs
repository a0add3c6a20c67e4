//! Remote command check.

use crate::fields;
use crate::poll::{LogCallback, PollSettings, poll_until, with_poll_fields};
use enactor::{CallContext, FieldType, Health, HealthCheck, NodeHandle, Schema, Section};

pub const NAME: &str = "command";

pub fn schema() -> Schema {
    with_poll_fields(
        Schema::new()
            .optional("command", FieldType::String)
            .optional("args", FieldType::list(FieldType::String)),
    )
}

/// Healthy when a command run through the node's resolver exits successfully
///
/// Without `command` the resolver's backend default is used.
#[derive(Debug, Default)]
pub struct CommandCheck;

impl HealthCheck for CommandCheck {
    fn check(&self, node: &NodeHandle, section: &Section, ctx: &CallContext) -> anyhow::Result<Health> {
        let command = fields::optional_string(section, "command");
        let args = fields::strings(NAME, section, "args")?;
        let settings = PollSettings::from_section(NAME, section)?;
        let label = command.as_deref().unwrap_or("default command");

        poll_until(&settings, ctx, Some(&LogCallback), || {
            let output = node.cmd(command.as_deref(), &args, ctx)?;
            if output.success {
                Ok(Health::Healthy)
            } else {
                Ok(Health::unhealthy(format!(
                    "{label} exited unsuccessfully: {}",
                    output.stderr_str().trim()
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Scripted, handle};
    use serde_json::json;

    #[test]
    fn test_successful_command() {
        let resolver = Scripted::new(&[true]);
        let calls = resolver.calls();
        let section = Section::new(NAME)
            .with("command", "systemctl")
            .with("args", json!(["is-active", "nginx"]));
        let health = CommandCheck
            .check(&handle(resolver), &section, &CallContext::default())
            .unwrap();
        assert!(health.is_healthy());
        assert_eq!(calls.lock().unwrap().as_slice(), ["systemctl is-active nginx"]);
    }

    #[test]
    fn test_failing_command_polls_until_success() {
        let resolver = Scripted::new(&[false, false, true]);
        let calls = resolver.calls();
        let section = Section::new(NAME)
            .with("timeout", 10)
            .with("poll_delay", 0);
        let health = CommandCheck
            .check(&handle(resolver), &section, &CallContext::default())
            .unwrap();
        assert!(health.is_healthy());
        assert_eq!(calls.lock().unwrap().len(), 3);
        assert_eq!(calls.lock().unwrap()[0], "<default>");
    }

    #[test]
    fn test_failing_command_is_unhealthy() {
        let section = Section::new(NAME).with("command", "pg_isready");
        let health = CommandCheck
            .check(&handle(Scripted::new(&[false])), &section, &CallContext::default())
            .unwrap();
        assert_eq!(health, Health::unhealthy("pg_isready exited unsuccessfully: not ready"));
    }

    #[test]
    fn test_command_error_is_a_check_error() {
        let err = CommandCheck
            .check(&handle(Scripted::new(&[])), &Section::new(NAME), &CallContext::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<enactor::Error>(),
            Some(enactor::Error::Command { .. })
        ));
    }
}
