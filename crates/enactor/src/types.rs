//! Core types for runs and their results

use crate::instruction::{InstructionId, InstructionKind};
use crate::node::{NodeStatus, ResolvedNode};
use crate::record::ExecutionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Output;
use std::str::FromStr;
use std::time::Duration;

/// Which successful instructions are compensated when a run fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackScope {
    /// Undo every successful instruction of the run
    #[default]
    WholeRun,
    /// Undo only nodes that had a failing instruction
    FailedNodes,
}

impl fmt::Display for RollbackScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WholeRun => write!(f, "whole_run"),
            Self::FailedNodes => write!(f, "failed_nodes"),
        }
    }
}

impl FromStr for RollbackScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "whole_run" => Ok(Self::WholeRun),
            "failed_nodes" => Ok(Self::FailedNodes),
            other => Err(format!(
                "unknown rollback scope '{other}' (expected whole_run or failed_nodes)"
            )),
        }
    }
}

/// Options for a run
#[derive(Debug, Clone)]
pub struct EnactOptions {
    /// Number of worker threads dispatching instructions of a wave
    pub jobs: usize,
    /// Maximum duration of a single plugin call
    pub instruction_timeout: Option<Duration>,
    pub rollback_scope: RollbackScope,
}

impl Default for EnactOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            instruction_timeout: None,
            rollback_scope: RollbackScope::WholeRun,
        }
    }
}

/// Final result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    /// The run failed and every compensating action succeeded
    RolledBack,
    /// The run failed and some compensating action failed or never ran
    RollbackIncomplete,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::RolledBack => write!(f, "failed and rolled back"),
            Self::RollbackIncomplete => write!(f, "failed, rollback incomplete"),
        }
    }
}

/// A forward instruction that failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionFailure {
    pub instruction: InstructionId,
    pub kind: InstructionKind,
    pub node_name: String,
    pub error: String,
}

/// What rollback does about one forward instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAction {
    /// Delete the node a create produced
    Delete,
    /// Ask the config-management plugin to revert its section
    UndoConfigure,
    /// No safe compensation exists; the step is listed but not undone
    Reported,
    /// Nothing to compensate
    NoOp,
}

impl fmt::Display for RollbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "delete"),
            Self::UndoConfigure => write!(f, "undo configure"),
            Self::Reported => write!(f, "reported, not undone"),
            Self::NoOp => write!(f, "no-op"),
        }
    }
}

/// How a rollback step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The action needs no dispatch (reported or no-op)
    Recorded,
    Succeeded,
    Failed { error: String },
    /// A compensation it depends on failed, so it was not attempted
    NotAttempted { reason: String },
}

impl StepStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::NotAttempted { .. })
    }
}

/// One compensating action, in the order rollback decided on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackStep {
    /// Forward instruction being compensated
    pub compensates: InstructionId,
    pub compensated_kind: InstructionKind,
    pub node_name: String,
    pub action: RollbackAction,
    /// Dispatched compensating instruction, if any
    pub instruction: Option<InstructionId>,
    pub status: StepStatus,
}

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub infra_name: String,
    pub outcome: RunOutcome,
    /// Final state of every node that was created during the run or given
    /// to it
    pub nodes: Vec<ResolvedNode>,
    pub record: ExecutionRecord,
    pub failures: Vec<InstructionFailure>,
    pub rollback: Vec<RollbackStep>,
    pub cancelled: bool,
    /// Forward waves dispatched
    pub waves: usize,
    /// Forward instructions never dispatched because the run stopped
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    /// Nodes that still exist on their backend
    pub fn live_nodes(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.nodes.iter().filter(|n| n.status().is_live())
    }

    pub fn nodes_in(&self, status: NodeStatus) -> impl Iterator<Item = &ResolvedNode> {
        self.nodes.iter().filter(move |n| n.status() == status)
    }

    /// Rollback steps that failed or were not attempted
    pub fn rollback_failures(&self) -> impl Iterator<Item = &RollbackStep> {
        self.rollback.iter().filter(|s| s.status.is_failure())
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Output of a command run against a node
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_scope_parse() {
        assert_eq!("whole_run".parse::<RollbackScope>().unwrap(), RollbackScope::WholeRun);
        assert_eq!("failed-nodes".parse::<RollbackScope>().unwrap(), RollbackScope::FailedNodes);
        assert!("everything".parse::<RollbackScope>().is_err());
        assert_eq!(RollbackScope::default(), RollbackScope::WholeRun);
    }

    #[test]
    fn test_rollback_scope_serde() {
        let v: RollbackScope = serde_json::from_str("\"failed_nodes\"").unwrap();
        assert_eq!(v, RollbackScope::FailedNodes);
        assert_eq!(serde_json::to_string(&RollbackScope::WholeRun).unwrap(), "\"whole_run\"");
    }

    #[test]
    fn test_default_options() {
        let opts = EnactOptions::default();
        assert_eq!(opts.jobs, 4);
        assert!(opts.instruction_timeout.is_none());
    }

    #[test]
    fn test_step_status_failure() {
        assert!(!StepStatus::Recorded.is_failure());
        assert!(!StepStatus::Succeeded.is_failure());
        assert!(StepStatus::Failed { error: "x".into() }.is_failure());
        assert!(StepStatus::NotAttempted { reason: "x".into() }.is_failure());
    }
}
