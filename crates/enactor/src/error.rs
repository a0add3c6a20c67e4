//! Error types for the enactor crate
//!
//! Errors fall into three classes:
//! - plan-build errors ([`Error::Schema`], [`Error::PluginNotFound`], ...)
//!   abort before any plugin is invoked
//! - instruction-level errors ([`Error::Create`], [`Error::Config`], ...)
//!   are caught by the Enactor and turned into a rollback trigger
//! - [`Error::RollbackIncomplete`] is the only error a run returns

use crate::instruction::InstructionKind;
use crate::registry::PluginKind;
use crate::schema::SchemaError;
use crate::types::RunReport;
use std::time::Duration;
use thiserror::Error;

/// Result type for enactor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, planning or running an infrastructure
#[derive(Error, Debug)]
pub enum Error {
    /// Plugin configuration or node definition shape is invalid
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A filter or section references a plugin that was never registered
    #[error("{kind} plugin not found: {name}")]
    PluginNotFound { name: String, kind: PluginKind },

    /// The same plugin name was registered twice for one capability
    #[error("{kind} plugin already registered: {name}")]
    DuplicatePlugin { name: String, kind: PluginKind },

    /// Node families depend on each other in a loop
    #[error("dependency cycle between node families: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// A name template could not be parsed
    #[error("invalid name template '{template}': {message}")]
    Template { template: String, message: String },

    /// Two nodes in one plan generated the same name
    #[error("generated node name is not unique: {0}")]
    NameCollision(String),

    /// Resolver failed to create a node
    #[error("create failed for {node}: {message}")]
    Create { node: String, message: String },

    /// Resolver failed to delete a node
    #[error("delete failed for {node}: {message}")]
    Delete { node: String, message: String },

    /// Config-management plugin failed to apply (or undo) a section
    #[error("configuration failed for {node}: {message}")]
    Config { node: String, message: String },

    /// Health-check plugin could not perform the check
    #[error("health check errored for {node}: {message}")]
    Check { node: String, message: String },

    /// Health-check plugin reported the node as not ready
    #[error("node {node} is unhealthy: {reason}")]
    Unhealthy { node: String, reason: String },

    /// Remote command execution failed
    #[error("command failed on {node}: {message}")]
    Command { node: String, message: String },

    /// A plugin call exceeded the per-instruction timeout
    #[error("{kind} on {node} timed out after {}s", .elapsed.as_secs())]
    Timeout {
        node: String,
        kind: InstructionKind,
        elapsed: Duration,
    },

    /// Compensating instructions failed; the infrastructure is left inconsistent
    #[error("rollback incomplete: {} compensating action(s) failed or were not attempted", .failures.len())]
    RollbackIncomplete {
        failures: Vec<String>,
        report: Box<RunReport>,
    },

    /// Worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    Pool(String),

    /// Engine bookkeeping reached a state it cannot continue from
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert a plugin error into the instruction-level error for `kind`
    pub fn instruction(kind: InstructionKind, node: &str, err: &anyhow::Error) -> Self {
        let node = node.to_string();
        let message = format!("{err:#}");
        match kind {
            InstructionKind::Create => Self::Create { node, message },
            InstructionKind::Delete => Self::Delete { node, message },
            InstructionKind::Configure => Self::Config { node, message },
            InstructionKind::HealthCheck => Self::Check { node, message },
        }
    }

    /// Whether this error aborts planning before any side effect
    pub fn is_plan_error(&self) -> bool {
        matches!(
            self,
            Self::Schema(_)
                | Self::PluginNotFound { .. }
                | Self::DuplicatePlugin { .. }
                | Self::DependencyCycle(_)
                | Self::Template { .. }
                | Self::NameCollision(_)
        )
    }

    /// Whether this error was produced by a single instruction
    pub fn is_instruction_error(&self) -> bool {
        matches!(
            self,
            Self::Create { .. }
                | Self::Delete { .. }
                | Self::Config { .. }
                | Self::Check { .. }
                | Self::Unhealthy { .. }
                | Self::Command { .. }
                | Self::Timeout { .. }
        )
    }

    /// The run report attached to an incomplete rollback
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::RollbackIncomplete { report, .. } => Some(report),
            _ => None,
        }
    }
}
