//! Instruction set
//!
//! An instruction is one plugin call bound to one node: create, configure,
//! health-check or delete. Instructions are immutable once built; the
//! [`ExecutionPlan`](crate::plan::ExecutionPlan) owns them and the Enactor
//! only reads them.

use crate::definition::Section;
use crate::plan::SlotId;
use crate::plugin::{ConfigManager, CreateRequest, HealthCheck};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Index of an instruction within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstructionId(pub usize);

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    Create,
    Configure,
    HealthCheck,
    Delete,
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Configure => write!(f, "configure"),
            Self::HealthCheck => write!(f, "health_check"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// The two configuration stages of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStage {
    Contextualisation,
    ConfigManagement,
}

impl fmt::Display for ConfigStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contextualisation => write!(f, "contextualisation"),
            Self::ConfigManagement => write!(f, "config_management"),
        }
    }
}

/// The plugin call an instruction performs, with its parameters
#[derive(Clone)]
pub enum Operation {
    Create(CreateRequest),
    Configure {
        stage: ConfigStage,
        section: Section,
        manager: Arc<dyn ConfigManager>,
    },
    /// Revert a configure; only issued by rollback
    UndoConfigure {
        stage: ConfigStage,
        section: Section,
        manager: Arc<dyn ConfigManager>,
    },
    HealthCheck {
        section: Section,
        checker: Arc<dyn HealthCheck>,
    },
    /// Delete the node currently held by the instruction's slot
    Delete,
}

impl Operation {
    pub fn kind(&self) -> InstructionKind {
        match self {
            Self::Create(_) => InstructionKind::Create,
            Self::Configure { .. } | Self::UndoConfigure { .. } => InstructionKind::Configure,
            Self::HealthCheck { .. } => InstructionKind::HealthCheck,
            Self::Delete => InstructionKind::Delete,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(req) => f.debug_tuple("Create").field(&req.name).finish(),
            Self::Configure { stage, section, .. } => f
                .debug_struct("Configure")
                .field("stage", stage)
                .field("plugin", &section.plugin)
                .finish_non_exhaustive(),
            Self::UndoConfigure { stage, section, .. } => f
                .debug_struct("UndoConfigure")
                .field("stage", stage)
                .field("plugin", &section.plugin)
                .finish_non_exhaustive(),
            Self::HealthCheck { section, .. } => f
                .debug_struct("HealthCheck")
                .field("plugin", &section.plugin)
                .finish_non_exhaustive(),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// One node-lifecycle step bound to a node and a plugin
#[derive(Debug, Clone)]
pub struct Instruction {
    pub id: InstructionId,
    pub kind: InstructionKind,
    /// Node slot the instruction acts on
    pub slot: SlotId,
    pub node_name: String,
    /// Name of the plugin that serves the call
    pub plugin: String,
    pub op: Operation,
    /// Instructions that must succeed first
    pub depends_on: BTreeSet<InstructionId>,
    /// Forward instruction this one compensates, for rollback instructions
    pub compensates: Option<InstructionId>,
}

impl Instruction {
    /// Short human-readable description
    pub fn describe(&self) -> String {
        match &self.op {
            Operation::Create(_) => format!("create {} ({})", self.node_name, self.plugin),
            Operation::Configure { stage, .. } => {
                format!("{stage} {} ({})", self.node_name, self.plugin)
            }
            Operation::UndoConfigure { stage, .. } => {
                format!("undo {stage} {} ({})", self.node_name, self.plugin)
            }
            Operation::HealthCheck { .. } => {
                format!("health_check {} ({})", self.node_name, self.plugin)
            }
            Operation::Delete => format!("delete {} ({})", self.node_name, self.plugin),
        }
    }

    pub fn is_rollback(&self) -> bool {
        self.compensates.is_some()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.describe())
    }
}
