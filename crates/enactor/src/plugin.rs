//! Plugin capability traits
//!
//! There are three capabilities, each a closed trait:
//!
//! - [`Resolver`]: creates, deletes and addresses nodes on one backend
//! - [`ConfigManager`]: applies a contextualisation or configuration section
//! - [`HealthCheck`]: decides whether a node is ready
//!
//! Plugin methods return [`anyhow::Result`]. The Enactor converts any error
//! into the instruction-level error for the call that produced it, so plugins
//! are free to attach context with `.context(...)`.

use crate::context::CallContext;
use crate::definition::{NodeDefinition, Section};
use crate::error::Error;
use crate::node::ResolvedNode;
use crate::schema::Params;
use crate::types::CommandOutput;
use anyhow::Result;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;

/// Everything a resolver needs to create one node
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Deterministic identifier assigned at plan time
    pub node_id: String,
    /// Generated (and length-cut) node name
    pub name: String,
    /// Instance index within the node family
    pub index: usize,
    pub definition: Arc<NodeDefinition>,
}

impl CreateRequest {
    /// Resolver parameters declared on the node family
    pub fn params(&self) -> &Params {
        &self.definition.resource
    }
}

/// Node resolution on one backend
pub trait Resolver: Send + Sync {
    /// Allocate a node
    ///
    /// If the backend allocated something before failing, return an error
    /// wrapping [`PartiallyCreated`] so rollback can delete it.
    fn create(&self, request: &CreateRequest, ctx: &CallContext) -> Result<ResolvedNode>;

    /// Release a node
    fn delete(&self, node: &ResolvedNode, ctx: &CallContext) -> Result<()>;

    /// Canonical address of the node
    fn get_ip(&self, node: &ResolvedNode) -> Result<IpAddr> {
        Ok(node.primary_address())
    }

    /// All addresses of the node in a stable order, primary included
    fn get_ip_all(&self, node: &ResolvedNode) -> Result<Vec<IpAddr>> {
        Ok(node.addresses().to_vec())
    }

    /// Private or internal address of the node
    fn get_priv_ip(&self, node: &ResolvedNode) -> Result<IpAddr> {
        Ok(node.private_address())
    }

    /// Run a command against the node
    ///
    /// `command` is optional; when omitted the resolver uses its backend
    /// default.
    fn cmd(
        &self,
        node: &ResolvedNode,
        command: Option<&str>,
        args: &[String],
        ctx: &CallContext,
    ) -> Result<CommandOutput>;
}

/// Applies a configuration section to a created node
pub trait ConfigManager: Send + Sync {
    fn apply(&self, node: &NodeHandle, section: &Section, ctx: &CallContext) -> Result<()>;

    /// Whether [`undo`](Self::undo) is a safe compensation for `apply`
    fn supports_undo(&self) -> bool {
        false
    }

    fn undo(&self, node: &NodeHandle, _section: &Section, _ctx: &CallContext) -> Result<()> {
        anyhow::bail!("configuration of {} cannot be undone", node.name())
    }
}

/// Decides whether a node is ready
///
/// A check may poll internally until its own timeout; a single call is
/// terminal as far as the Enactor is concerned.
pub trait HealthCheck: Send + Sync {
    fn check(&self, node: &NodeHandle, section: &Section, ctx: &CallContext) -> Result<Health>;
}

/// Result of a health check that could be performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy { reason: String },
}

impl Health {
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self::Unhealthy {
            reason: reason.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// A node allocated by a create call that then failed
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PartiallyCreated {
    pub node: Box<ResolvedNode>,
    pub message: String,
}

impl PartiallyCreated {
    pub fn new(node: ResolvedNode, message: impl Into<String>) -> Self {
        Self {
            node: Box::new(node),
            message: message.into(),
        }
    }
}

/// A created node together with the resolver that owns it
///
/// Config-management and health-check plugins reach addresses and remote
/// commands through this handle.
#[derive(Clone)]
pub struct NodeHandle {
    node: ResolvedNode,
    resolver: Arc<dyn Resolver>,
}

impl NodeHandle {
    pub fn new(node: ResolvedNode, resolver: Arc<dyn Resolver>) -> Self {
        Self { node, resolver }
    }

    pub fn node(&self) -> &ResolvedNode {
        &self.node
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn ip(&self) -> Result<IpAddr> {
        self.resolver.get_ip(&self.node)
    }

    pub fn ip_all(&self) -> Result<Vec<IpAddr>> {
        self.resolver.get_ip_all(&self.node)
    }

    pub fn priv_ip(&self) -> Result<IpAddr> {
        self.resolver.get_priv_ip(&self.node)
    }

    /// Run a command on the node, returning its output whatever the status
    pub fn cmd(&self, command: Option<&str>, args: &[String], ctx: &CallContext) -> Result<CommandOutput> {
        self.resolver
            .cmd(&self.node, command, args, ctx)
            .map_err(|e| {
                Error::Command {
                    node: self.node.name.clone(),
                    message: format!("{e:#}"),
                }
                .into()
            })
    }

    /// Run a command and fail unless it exits successfully
    pub fn cmd_checked(&self, command: Option<&str>, args: &[String], ctx: &CallContext) -> Result<CommandOutput> {
        let output = self.cmd(command, args, ctx)?;
        if !output.success {
            return Err(Error::Command {
                node: self.node.name.clone(),
                message: format!(
                    "{} exited unsuccessfully: {}",
                    command.unwrap_or("default command"),
                    output.stderr_str().trim()
                ),
            }
            .into());
        }
        Ok(output)
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}
