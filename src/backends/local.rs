//! Resolver for nodes that are addresses on this machine.
//!
//! Nothing is provisioned: `create` records the configured addresses and
//! `cmd` runs the command locally. Useful for trying infrastructure files
//! and for driving real tools (`docker`, `systemctl`) on the host.

use crate::runner;
use anyhow::{Context, Result};
use enactor::{
    CallContext, CommandOutput, CreateRequest, FieldType, Params, ResolvedNode, Resolver, Schema,
};
use serde_json::Value;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Mutex, PoisonError};

pub const NAME: &str = "local";

/// Command used when `cmd` is called without one
pub const DEFAULT_COMMAND: &str = "docker";

pub fn schema() -> Schema {
    Schema::new()
        .optional("addresses", FieldType::non_empty_list(FieldType::IpAddr))
        .optional("private_address", FieldType::IpAddr)
        .optional("default_command", FieldType::String)
}

#[derive(Default)]
pub struct LocalResolver {
    /// Default command per node id
    commands: Mutex<HashMap<String, String>>,
}

impl LocalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn default_command(&self, node: &ResolvedNode) -> String {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&node.node_id)
            .cloned()
            .unwrap_or_else(|| DEFAULT_COMMAND.to_string())
    }
}

fn parse_ip(value: &str) -> Result<IpAddr> {
    value
        .parse()
        .with_context(|| format!("'{value}' is not an IP address"))
}

fn addresses(params: &Params) -> Result<Vec<IpAddr>> {
    let Some(Value::Array(items)) = params.get("addresses") else {
        return Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);
    };
    if items.is_empty() {
        anyhow::bail!("'addresses' must not be empty");
    }
    items
        .iter()
        .map(|v| {
            v.as_str()
                .context("addresses must be strings")
                .and_then(parse_ip)
        })
        .collect()
}

impl Resolver for LocalResolver {
    fn create(&self, request: &CreateRequest, _ctx: &CallContext) -> Result<ResolvedNode> {
        let params = request.params();
        let mut addrs = addresses(params)?.into_iter();
        let primary = addrs.next().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        let mut node = ResolvedNode::new(request, format!("local-{}", request.node_id), primary)
            .with_addresses(addrs);
        if let Some(private) = params.get("private_address").and_then(Value::as_str) {
            node = node.with_private_address(parse_ip(private)?);
        }

        if let Some(command) = params.get("default_command").and_then(Value::as_str) {
            self.commands
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(request.node_id.clone(), command.to_string());
        }

        log::debug!("local node {} at {}", node.name, node.primary_address());
        Ok(node)
    }

    fn delete(&self, node: &ResolvedNode, _ctx: &CallContext) -> Result<()> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&node.node_id);
        log::debug!("released local node {}", node.name);
        Ok(())
    }

    fn cmd(
        &self,
        node: &ResolvedNode,
        command: Option<&str>,
        args: &[String],
        _ctx: &CallContext,
    ) -> Result<CommandOutput> {
        let command = match command {
            Some(c) => c.to_string(),
            None => {
                let default = self.default_command(node);
                if !runner::command_exists(&default) {
                    anyhow::bail!(
                        "default command '{default}' not found, set resource.default_command"
                    );
                }
                default
            }
        };
        runner::run_output(&command, args)
    }
}
