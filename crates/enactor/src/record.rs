//! Execution record
//!
//! Append-only log of instruction outcomes for one run. Entries are indexed
//! by sequence number in the order the Enactor absorbed them, which is the
//! completion order. Rollback decisions read this log and nothing else.

use crate::instruction::{InstructionId, InstructionKind};
use crate::plan::SlotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which pass of a run produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Forward,
    Rollback,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOutcome {
    Succeeded,
    Failed { error: String },
    /// Never dispatched
    Skipped { reason: String },
}

impl EntryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntry {
    pub seq: usize,
    pub phase: Phase,
    pub instruction: InstructionId,
    pub kind: InstructionKind,
    pub slot: SlotId,
    pub node_name: String,
    pub description: String,
    pub outcome: EntryOutcome,
    pub at: DateTime<Utc>,
    /// Forward instruction compensated by this entry, for rollback entries
    pub compensates: Option<InstructionId>,
}

/// Append-only record of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRecord {
    entries: Vec<RecordEntry>,
}

/// Fields of an entry before it gets a sequence number and timestamp
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub phase: Phase,
    pub instruction: InstructionId,
    pub kind: InstructionKind,
    pub slot: SlotId,
    pub node_name: String,
    pub description: String,
    pub outcome: EntryOutcome,
    pub compensates: Option<InstructionId>,
}

impl ExecutionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, returning it with its sequence number and timestamp
    pub fn append(&mut self, entry: NewEntry) -> &RecordEntry {
        let seq = self.entries.len();
        self.entries.push(RecordEntry {
            seq,
            phase: entry.phase,
            instruction: entry.instruction,
            kind: entry.kind,
            slot: entry.slot,
            node_name: entry.node_name,
            description: entry.description,
            outcome: entry.outcome,
            at: Utc::now(),
            compensates: entry.compensates,
        });
        &self.entries[seq]
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry recorded for an instruction, if any
    pub fn entry_for(&self, id: InstructionId) -> Option<&RecordEntry> {
        self.entries.iter().find(|e| e.instruction == id)
    }

    /// Successful entries of `phase`, most recent first
    pub fn successes_rev(&self, phase: Phase) -> impl Iterator<Item = &RecordEntry> {
        self.entries
            .iter()
            .rev()
            .filter(move |e| e.phase == phase && e.outcome.is_success())
    }

    /// Failed entries of `phase`, in completion order
    pub fn failures(&self, phase: Phase) -> impl Iterator<Item = &RecordEntry> {
        self.entries
            .iter()
            .filter(move |e| e.phase == phase && e.outcome.is_failure())
    }
}
