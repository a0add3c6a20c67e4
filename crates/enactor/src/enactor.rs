//! Execution engine - runs a plan wave by wave and rolls back on failure
//!
//! The coordinating thread owns every piece of run state: instruction states,
//! node slots, the execution record. Only plugin calls run on the worker
//! pool. A wave is dispatched, its completions are collected into a shared
//! vector, and the coordinator then absorbs them one at a time in completion
//! order. Nothing but the coordinator writes the record or node statuses.

use crate::context::{CallContext, CancelToken, NoProgress, ProgressCallback};
use crate::definition::Section;
use crate::error::{Error, Result};
use crate::events::{Event, EventKind, Notifier, Observer};
use crate::instruction::{Instruction, InstructionId, InstructionKind, Operation};
use crate::node::{NodeStatus, ResolvedNode};
use crate::plan::{ExecutionPlan, NodeSlot, SlotId};
use crate::plugin::{
    ConfigManager, CreateRequest, Health, HealthCheck, NodeHandle, PartiallyCreated, Resolver,
};
use crate::record::{EntryOutcome, ExecutionRecord, NewEntry, Phase, RecordEntry};
use crate::types::{
    EnactOptions, InstructionFailure, RollbackAction, RollbackScope, RollbackStep, RunOutcome,
    RunReport, StepStatus,
};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Runs execution plans
///
/// ```ignore
/// let enactor = Enactor::new(EnactOptions::default()).with_observer(LogObserver);
/// let report = enactor.run(plan)?;
/// ```
#[derive(Debug, Clone)]
pub struct Enactor {
    options: EnactOptions,
    notifier: Notifier,
    cancel: CancelToken,
}

impl Enactor {
    pub fn new(options: EnactOptions) -> Self {
        Self {
            options,
            notifier: Notifier::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Register an observer for node events
    #[must_use]
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.notifier.subscribe(Arc::new(observer));
        self
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &EnactOptions {
        &self.options
    }

    /// Run a plan without progress reporting
    pub fn run(&self, plan: ExecutionPlan) -> Result<RunReport> {
        self.run_with_progress(plan, &mut NoProgress)
    }

    /// Run a plan
    ///
    /// Returns `Ok` when the run succeeded or failed and was fully rolled
    /// back (see [`RunReport::outcome`]). The only error is
    /// [`Error::RollbackIncomplete`], plus [`Error::Pool`] if no worker pool
    /// could be created.
    pub fn run_with_progress<P: ProgressCallback>(
        &self,
        plan: ExecutionPlan,
        progress: &mut P,
    ) -> Result<RunReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs.max(1))
            .thread_name(|i| format!("enactor-worker-{i}"))
            .build()
            .map_err(|e| Error::Pool(e.to_string()))?;

        let mut run = Run::new(self, pool, plan);
        log::info!(
            "starting run for '{}': {} instruction(s), {} node(s)",
            run.infra_name,
            run.forward_len,
            run.slots.len()
        );
        run.forward(progress);
        run.finish(progress)
    }
}

// ============================================================================
// Run state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Succeeded,
    Failed,
    Skipped,
}

struct SlotState {
    slot: NodeSlot,
    node: Option<ResolvedNode>,
}

struct Run<'e> {
    enactor: &'e Enactor,
    pool: rayon::ThreadPool,
    infra_name: String,
    slots: Vec<SlotState>,
    /// Forward instructions first, rollback instructions appended after them
    instructions: Vec<Instruction>,
    states: Vec<State>,
    forward_len: usize,
    record: ExecutionRecord,
    failures: Vec<InstructionFailure>,
    cancelled: bool,
    waves: usize,
    skipped: usize,
    started_at: chrono::DateTime<Utc>,
}

/// What a worker needs to perform one instruction
struct Job {
    id: InstructionId,
    kind: InstructionKind,
    node_name: String,
    work: Work,
}

enum Work {
    Create {
        resolver: Arc<dyn Resolver>,
        request: CreateRequest,
    },
    Delete {
        resolver: Arc<dyn Resolver>,
        node: ResolvedNode,
    },
    AlreadyDeleted,
    Configure {
        manager: Arc<dyn ConfigManager>,
        section: Section,
        handle: NodeHandle,
        undo: bool,
    },
    Check {
        checker: Arc<dyn HealthCheck>,
        section: Section,
        handle: NodeHandle,
    },
    /// The slot has no node to act on
    Missing,
}

enum Outcome {
    Created(Box<ResolvedNode>),
    Configured,
    Undone,
    Healthy,
    Unhealthy(String),
    Deleted,
    AlreadyDeleted,
    Failed {
        error: Error,
        partial: Option<Box<ResolvedNode>>,
    },
}

impl Outcome {
    fn failed(error: Error) -> Self {
        Self::Failed {
            error,
            partial: None,
        }
    }
}

struct Completion {
    id: InstructionId,
    outcome: Outcome,
}

impl<'e> Run<'e> {
    fn new(enactor: &'e Enactor, pool: rayon::ThreadPool, plan: ExecutionPlan) -> Self {
        let (infra_name, slots, instructions) = plan.into_parts();
        let slots = slots
            .into_iter()
            .map(|slot| SlotState {
                node: slot.existing.clone(),
                slot,
            })
            .collect();
        let forward_len = instructions.len();
        Self {
            enactor,
            pool,
            infra_name,
            slots,
            states: vec![State::Pending; forward_len],
            instructions,
            forward_len,
            record: ExecutionRecord::new(),
            failures: Vec::new(),
            cancelled: false,
            waves: 0,
            skipped: 0,
            started_at: Utc::now(),
        }
    }

    // ------------------------------------------------------------------------
    // Forward pass
    // ------------------------------------------------------------------------

    fn forward<P: ProgressCallback>(&mut self, progress: &mut P) {
        loop {
            let pending: Vec<InstructionId> = (0..self.forward_len)
                .filter(|&i| self.states[i] == State::Pending)
                .map(InstructionId)
                .collect();
            if pending.is_empty() {
                break;
            }
            if self.enactor.cancel.is_cancelled() {
                log::warn!("run cancelled, no further waves will be dispatched");
                self.cancelled = true;
                break;
            }

            let ready: Vec<InstructionId> = pending
                .iter()
                .copied()
                .filter(|&id| self.deps_succeeded(id))
                .collect();
            if ready.is_empty() {
                let stuck = &self.instructions[pending[0].0];
                log::error!("no instruction is ready; {} remain pending", pending.len());
                self.failures.push(InstructionFailure {
                    instruction: stuck.id,
                    kind: stuck.kind,
                    node_name: stuck.node_name.clone(),
                    error: Error::Internal(format!(
                        "{} pending instruction(s) have unsatisfiable dependencies",
                        pending.len()
                    ))
                    .to_string(),
                });
                break;
            }

            self.waves += 1;
            let wave = self.waves;
            log::info!("wave {wave}: dispatching {} instruction(s)", ready.len());
            progress.on_wave_start(Phase::Forward, wave, ready.len());

            let mut failed = false;
            for completion in self.dispatch(&ready, &self.enactor.cancel) {
                failed |= self.absorb(completion, Phase::Forward, progress);
            }
            progress.on_wave_complete(Phase::Forward, wave);

            if failed {
                log::warn!("wave {wave} had failures, stopping forward pass");
                break;
            }
        }

        let reason = if self.cancelled {
            "run was cancelled"
        } else {
            "run stopped after a failure"
        };
        for i in 0..self.forward_len {
            if self.states[i] == State::Pending {
                self.states[i] = State::Skipped;
                self.skipped += 1;
                self.append_entry(
                    InstructionId(i),
                    Phase::Forward,
                    EntryOutcome::Skipped {
                        reason: reason.to_string(),
                    },
                );
            }
        }
    }

    fn deps_succeeded(&self, id: InstructionId) -> bool {
        self.instructions[id.0]
            .depends_on
            .iter()
            .all(|d| self.states[d.0] == State::Succeeded)
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Run one wave of instructions, returning completions in completion order.
    /// Plugins see `cancel` through their [`CallContext`].
    fn dispatch(&self, ids: &[InstructionId], cancel: &CancelToken) -> Vec<Completion> {
        let jobs: Vec<Job> = ids.iter().map(|&id| self.job(id)).collect();
        let timeout = self.enactor.options.instruction_timeout;

        if jobs.len() == 1 {
            return jobs
                .into_iter()
                .map(|job| execute(job, timeout, cancel))
                .collect();
        }

        let results: Arc<Mutex<Vec<Completion>>> = Arc::new(Mutex::new(Vec::with_capacity(jobs.len())));
        self.pool.install(|| {
            jobs.into_par_iter().for_each(|job| {
                let completion = execute(job, timeout, cancel);
                push_completion(&results, completion);
            });
        });
        into_completions(results)
    }

    fn job(&self, id: InstructionId) -> Job {
        let instr = &self.instructions[id.0];
        let slot = &self.slots[instr.slot.0];
        let resolver = Arc::clone(&slot.slot.resolver);
        let handle = || {
            slot.node
                .clone()
                .map(|node| NodeHandle::new(node, Arc::clone(&resolver)))
        };

        let work = match &instr.op {
            Operation::Create(request) => Work::Create {
                resolver: Arc::clone(&resolver),
                request: request.clone(),
            },
            Operation::Delete => match &slot.node {
                Some(node) if node.status() == NodeStatus::Deleted => Work::AlreadyDeleted,
                Some(node) => Work::Delete {
                    resolver: Arc::clone(&resolver),
                    node: node.clone(),
                },
                None => Work::Missing,
            },
            Operation::Configure {
                section, manager, ..
            }
            | Operation::UndoConfigure {
                section, manager, ..
            } => match handle() {
                Some(handle) => Work::Configure {
                    manager: Arc::clone(manager),
                    section: section.clone(),
                    handle,
                    undo: matches!(instr.op, Operation::UndoConfigure { .. }),
                },
                None => Work::Missing,
            },
            Operation::HealthCheck { section, checker } => match handle() {
                Some(handle) => Work::Check {
                    checker: Arc::clone(checker),
                    section: section.clone(),
                    handle,
                },
                None => Work::Missing,
            },
        };

        Job {
            id,
            kind: instr.kind,
            node_name: instr.node_name.clone(),
            work,
        }
    }

    // ------------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------------

    /// Apply one completion to the run state; returns whether it failed
    fn absorb<P: ProgressCallback>(&mut self, completion: Completion, phase: Phase, progress: &mut P) -> bool {
        let Completion { id, outcome } = completion;
        let (slot, kind, node_name) = {
            let instr = &self.instructions[id.0];
            (instr.slot, instr.kind, instr.node_name.clone())
        };

        let mut event = None;
        let result = match outcome {
            Outcome::Created(node) => {
                self.slots[slot.0].node = Some(*node);
                event = Some(EventKind::NodeCreated);
                Ok(())
            }
            Outcome::Configured => {
                self.advance(slot, NodeStatus::Configured);
                Ok(())
            }
            Outcome::Undone => Ok(()),
            Outcome::Healthy => {
                self.advance(slot, NodeStatus::Healthy);
                event = Some(EventKind::HealthCheckResult {
                    healthy: true,
                    reason: None,
                });
                Ok(())
            }
            Outcome::Unhealthy(reason) => {
                event = Some(EventKind::HealthCheckResult {
                    healthy: false,
                    reason: Some(reason.clone()),
                });
                Err(Error::Unhealthy {
                    node: node_name.clone(),
                    reason,
                })
            }
            Outcome::Deleted => {
                self.advance(slot, NodeStatus::Deleted);
                event = Some(EventKind::NodeDeleted);
                Ok(())
            }
            Outcome::AlreadyDeleted => {
                log::debug!("{node_name} is already deleted, nothing to do");
                Ok(())
            }
            Outcome::Failed { error, partial } => {
                if let Some(node) = partial {
                    log::warn!("{node_name} was partially created ({})", node.instance_id);
                    if self.slots[slot.0].node.is_none() {
                        self.slots[slot.0].node = Some(*node);
                    }
                }
                Err(error)
            }
        };

        let failed = result.is_err();
        let entry_outcome = match result {
            Ok(()) => {
                log::debug!("{phase} {id} {kind} {node_name}: ok");
                self.states[id.0] = State::Succeeded;
                EntryOutcome::Succeeded
            }
            Err(error) => {
                log::error!("{phase} {id} {kind} {node_name}: {error}");
                self.states[id.0] = State::Failed;
                self.advance(slot, NodeStatus::Failed);
                if phase == Phase::Forward {
                    self.failures.push(InstructionFailure {
                        instruction: id,
                        kind,
                        node_name,
                        error: error.to_string(),
                    });
                }
                EntryOutcome::Failed {
                    error: error.to_string(),
                }
            }
        };

        let entry = self.append_entry(id, phase, entry_outcome);
        progress.on_instruction_complete(&entry);
        if let Some(kind) = event {
            self.emit(slot, kind);
        }
        failed
    }

    fn append_entry(&mut self, id: InstructionId, phase: Phase, outcome: EntryOutcome) -> RecordEntry {
        let instr = &self.instructions[id.0];
        self.record
            .append(NewEntry {
                phase,
                instruction: id,
                kind: instr.kind,
                slot: instr.slot,
                node_name: instr.node_name.clone(),
                description: instr.describe(),
                outcome,
                compensates: instr.compensates,
            })
            .clone()
    }

    fn advance(&mut self, slot: SlotId, status: NodeStatus) {
        if let Some(node) = self.slots[slot.0].node.as_mut() {
            node.advance(status);
        }
    }

    fn emit(&self, slot: SlotId, kind: EventKind) {
        let slot = &self.slots[slot.0].slot;
        let event = Event::new(kind, &slot.node_id, &slot.name, &self.infra_name);
        self.enactor.notifier.emit(&event);
    }

    // ------------------------------------------------------------------------
    // Rollback
    // ------------------------------------------------------------------------

    /// Decide and run compensating actions, most recent completion first
    fn rollback<P: ProgressCallback>(&mut self, progress: &mut P) -> Vec<RollbackStep> {
        let scope = self.enactor.options.rollback_scope;
        let failed_slots: HashSet<SlotId> = self
            .record
            .failures(Phase::Forward)
            .map(|e| e.slot)
            .collect();

        let forward_entries: Vec<(InstructionId, bool)> = self
            .record
            .entries()
            .iter()
            .rev()
            .filter(|e| e.phase == Phase::Forward && !matches!(e.outcome, EntryOutcome::Skipped { .. }))
            .map(|e| (e.instruction, e.outcome.is_success()))
            .collect();

        let mut steps = Vec::new();
        let mut planned: Vec<(InstructionId, usize, Operation)> = Vec::new();

        for (fwd, succeeded) in forward_entries {
            let instr = &self.instructions[fwd.0];
            if scope == RollbackScope::FailedNodes && !failed_slots.contains(&instr.slot) {
                continue;
            }
            let node = self.slots[instr.slot.0].node.as_ref();

            let (action, op) = if succeeded {
                match &instr.op {
                    Operation::Create(_) => match node {
                        Some(n) if n.status() != NodeStatus::Deleted => (RollbackAction::Delete, Some(Operation::Delete)),
                        _ => (RollbackAction::NoOp, None),
                    },
                    Operation::Configure {
                        stage,
                        section,
                        manager,
                    } if manager.supports_undo() => (
                        RollbackAction::UndoConfigure,
                        Some(Operation::UndoConfigure {
                            stage: *stage,
                            section: section.clone(),
                            manager: Arc::clone(manager),
                        }),
                    ),
                    Operation::Configure { .. } | Operation::Delete => (RollbackAction::Reported, None),
                    Operation::HealthCheck { .. } | Operation::UndoConfigure { .. } => (RollbackAction::NoOp, None),
                }
            } else {
                // A failed create can still leave a partially allocated node
                match (&instr.op, node) {
                    (Operation::Create(_), Some(n)) if n.status() != NodeStatus::Deleted => {
                        (RollbackAction::Delete, Some(Operation::Delete))
                    }
                    _ => continue,
                }
            };

            steps.push(RollbackStep {
                compensates: fwd,
                compensated_kind: instr.kind,
                node_name: instr.node_name.clone(),
                action,
                instruction: None,
                status: StepStatus::Recorded,
            });
            if let Some(op) = op {
                planned.push((fwd, steps.len() - 1, op));
            }
        }

        log::warn!(
            "rolling back '{}': {} action(s), {} to dispatch",
            self.infra_name,
            steps.len(),
            planned.len()
        );
        progress.on_rollback_start(steps.len());

        self.schedule_compensations(planned, &mut steps);
        self.run_rollback_waves(progress);

        for step in &mut steps {
            let Some(id) = step.instruction else { continue };
            let entry = self.record.entry_for(id);
            step.status = match (self.states[id.0], entry.map(|e| &e.outcome)) {
                (State::Succeeded, _) => StepStatus::Succeeded,
                (State::Failed, Some(EntryOutcome::Failed { error })) => StepStatus::Failed {
                    error: error.clone(),
                },
                (State::Failed, _) => StepStatus::Failed {
                    error: "compensation failed".to_string(),
                },
                (_, Some(EntryOutcome::Skipped { reason })) => StepStatus::NotAttempted {
                    reason: reason.clone(),
                },
                _ => StepStatus::NotAttempted {
                    reason: "never dispatched".to_string(),
                },
            };
        }
        steps
    }

    /// Append compensating instructions, reversing the forward dependencies
    ///
    /// A compensation waits for the compensations of every forward
    /// instruction that (transitively) depended on the one it undoes.
    fn schedule_compensations(&mut self, planned: Vec<(InstructionId, usize, Operation)>, steps: &mut [RollbackStep]) {
        let mut dependents: HashMap<InstructionId, Vec<InstructionId>> = HashMap::new();
        for instr in &self.instructions[..self.forward_len] {
            for dep in &instr.depends_on {
                dependents.entry(*dep).or_default().push(instr.id);
            }
        }

        let mut comp_of: HashMap<InstructionId, InstructionId> = HashMap::new();
        for (offset, (fwd, _, _)) in planned.iter().enumerate() {
            comp_of.insert(*fwd, InstructionId(self.instructions.len() + offset));
        }

        for (fwd, step, op) in planned {
            let id = comp_of[&fwd];
            let depends_on: BTreeSet<InstructionId> = descendants(fwd, &dependents)
                .into_iter()
                .filter_map(|d| comp_of.get(&d).copied())
                .collect();
            let forward = &self.instructions[fwd.0];
            let slot = forward.slot;
            let plugin = match &op {
                Operation::Delete => self.slots[slot.0].slot.resolver_name.clone(),
                _ => forward.plugin.clone(),
            };
            let instr = Instruction {
                id,
                kind: op.kind(),
                slot,
                node_name: forward.node_name.clone(),
                plugin,
                op,
                depends_on,
                compensates: Some(fwd),
            };
            log::debug!("scheduled compensation {instr} for {fwd}");
            self.instructions.push(instr);
            self.states.push(State::Pending);
            steps[step].instruction = Some(id);
        }
    }

    fn run_rollback_waves<P: ProgressCallback>(&mut self, progress: &mut P) {
        // Compensations run to completion even when the run token was cancelled
        let cancel = CancelToken::new();
        let mut wave = 0;
        loop {
            let pending: Vec<InstructionId> = (self.forward_len..self.instructions.len())
                .filter(|&i| self.states[i] == State::Pending)
                .map(InstructionId)
                .collect();
            if pending.is_empty() {
                break;
            }

            let blocked: Vec<InstructionId> = pending
                .iter()
                .copied()
                .filter(|&id| {
                    self.instructions[id.0]
                        .depends_on
                        .iter()
                        .any(|d| matches!(self.states[d.0], State::Failed | State::Skipped))
                })
                .collect();
            if !blocked.is_empty() {
                for id in blocked {
                    self.states[id.0] = State::Skipped;
                    self.append_entry(
                        id,
                        Phase::Rollback,
                        EntryOutcome::Skipped {
                            reason: "a compensation it depends on failed".to_string(),
                        },
                    );
                }
                continue;
            }

            let ready: Vec<InstructionId> = pending
                .iter()
                .copied()
                .filter(|&id| self.deps_succeeded(id))
                .collect();
            if ready.is_empty() {
                log::error!("rollback stalled with {} compensation(s) pending", pending.len());
                for id in pending {
                    self.states[id.0] = State::Skipped;
                    self.append_entry(
                        id,
                        Phase::Rollback,
                        EntryOutcome::Skipped {
                            reason: "rollback could not make progress".to_string(),
                        },
                    );
                }
                break;
            }

            wave += 1;
            log::info!("rollback wave {wave}: dispatching {} compensation(s)", ready.len());
            progress.on_wave_start(Phase::Rollback, wave, ready.len());
            for completion in self.dispatch(&ready, &cancel) {
                self.absorb(completion, Phase::Rollback, progress);
            }
            progress.on_wave_complete(Phase::Rollback, wave);
        }
    }

    // ------------------------------------------------------------------------
    // Result
    // ------------------------------------------------------------------------

    fn finish<P: ProgressCallback>(mut self, progress: &mut P) -> Result<RunReport> {
        let failed = !self.failures.is_empty() || self.cancelled;
        let rollback = if failed { self.rollback(progress) } else { Vec::new() };

        let rollback_failures: Vec<String> = rollback
            .iter()
            .filter_map(|s| match &s.status {
                StepStatus::Failed { error } => Some(format!("{} {}: {error}", s.action, s.node_name)),
                StepStatus::NotAttempted { reason } => Some(format!("{} {}: {reason}", s.action, s.node_name)),
                _ => None,
            })
            .collect();

        let outcome = match (failed, rollback_failures.is_empty()) {
            (false, _) => RunOutcome::Succeeded,
            (true, true) => RunOutcome::RolledBack,
            (true, false) => RunOutcome::RollbackIncomplete,
        };

        let report = RunReport {
            infra_name: self.infra_name.clone(),
            outcome,
            nodes: self.slots.iter().filter_map(|s| s.node.clone()).collect(),
            record: std::mem::take(&mut self.record),
            failures: std::mem::take(&mut self.failures),
            rollback,
            cancelled: self.cancelled,
            waves: self.waves,
            skipped: self.skipped,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };

        match outcome {
            RunOutcome::Succeeded => log::info!("run for '{}' succeeded", report.infra_name),
            RunOutcome::RolledBack => log::warn!("run for '{}' failed and was rolled back", report.infra_name),
            RunOutcome::RollbackIncomplete => {
                log::error!(
                    "run for '{}' failed and {} compensating action(s) did not complete",
                    report.infra_name,
                    rollback_failures.len()
                );
                return Err(Error::RollbackIncomplete {
                    failures: rollback_failures,
                    report: Box::new(report),
                });
            }
        }
        Ok(report)
    }
}

// ============================================================================
// Worker side
// ============================================================================

/// Perform one job, enforcing the per-instruction timeout
fn execute(job: Job, timeout: Option<Duration>, cancel: &CancelToken) -> Completion {
    let Job {
        id,
        kind,
        node_name,
        work,
    } = job;
    log::debug!("dispatch {id} {kind} {node_name}");

    let ctx = CallContext::new(timeout.map(|t| Instant::now() + t), cancel.clone());
    let outcome = match timeout {
        None => guarded(work, &ctx, kind, &node_name),
        Some(limit) => {
            let started = Instant::now();
            let (tx, rx) = mpsc::channel();
            let name = node_name.clone();
            let spawned = thread::Builder::new()
                .name(format!("enactor-call-{}", id.0))
                .spawn(move || {
                    // The receiver is gone if the call timed out
                    let _ = tx.send(guarded(work, &ctx, kind, &name));
                });
            match spawned {
                Err(e) => Outcome::failed(Error::Internal(format!("failed to spawn plugin thread: {e}"))),
                Ok(_) => match rx.recv_timeout(limit) {
                    Ok(outcome) => outcome,
                    Err(RecvTimeoutError::Timeout) => {
                        log::warn!("{kind} on {node_name} exceeded {limit:?}; the plugin call continues detached");
                        Outcome::failed(Error::Timeout {
                            node: node_name.clone(),
                            kind,
                            elapsed: started.elapsed(),
                        })
                    }
                    Err(RecvTimeoutError::Disconnected) => Outcome::failed(Error::Internal(format!(
                        "plugin thread for {kind} on {node_name} exited without a result"
                    ))),
                },
            }
        }
    };
    Completion { id, outcome }
}

/// Perform a plugin call, turning a panic into an instruction failure
fn guarded(work: Work, ctx: &CallContext, kind: InstructionKind, node_name: &str) -> Outcome {
    catch_unwind(AssertUnwindSafe(|| perform(work, ctx, kind, node_name))).unwrap_or_else(|_| {
        Outcome::failed(Error::instruction(
            kind,
            node_name,
            &anyhow::anyhow!("plugin panicked"),
        ))
    })
}

fn perform(work: Work, ctx: &CallContext, kind: InstructionKind, node_name: &str) -> Outcome {
    match work {
        Work::Create { resolver, request } => match resolver.create(&request, ctx) {
            Ok(node) => Outcome::Created(Box::new(node)),
            Err(err) => {
                let partial = err
                    .downcast_ref::<PartiallyCreated>()
                    .map(|p| p.node.clone());
                Outcome::Failed {
                    error: plugin_error(kind, node_name, err),
                    partial,
                }
            }
        },
        Work::Delete { resolver, node } => match resolver.delete(&node, ctx) {
            Ok(()) => Outcome::Deleted,
            Err(err) => Outcome::failed(plugin_error(kind, node_name, err)),
        },
        Work::AlreadyDeleted => Outcome::AlreadyDeleted,
        Work::Configure {
            manager,
            section,
            handle,
            undo,
        } => {
            let result = if undo {
                manager.undo(&handle, &section, ctx)
            } else {
                manager.apply(&handle, &section, ctx)
            };
            match result {
                Ok(()) if undo => Outcome::Undone,
                Ok(()) => Outcome::Configured,
                Err(err) => Outcome::failed(plugin_error(kind, node_name, err)),
            }
        }
        Work::Check {
            checker,
            section,
            handle,
        } => match checker.check(&handle, &section, ctx) {
            Ok(Health::Healthy) => Outcome::Healthy,
            Ok(Health::Unhealthy { reason }) => Outcome::Unhealthy(reason),
            Err(err) => Outcome::failed(plugin_error(kind, node_name, err)),
        },
        Work::Missing => Outcome::failed(Error::instruction(
            kind,
            node_name,
            &anyhow::anyhow!("the node was never created"),
        )),
    }
}

/// Map a plugin error onto the instruction-level error kind
///
/// Remote command failures raised through [`NodeHandle`] keep their own kind.
fn plugin_error(kind: InstructionKind, node_name: &str, err: anyhow::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(e @ Error::Command { .. }) => e,
        Ok(other) => Error::instruction(kind, node_name, &anyhow::Error::new(other)),
        Err(err) => Error::instruction(kind, node_name, &err),
    }
}

fn push_completion(results: &Mutex<Vec<Completion>>, completion: Completion) {
    results
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(completion);
}

fn into_completions(results: Arc<Mutex<Vec<Completion>>>) -> Vec<Completion> {
    match Arc::try_unwrap(results) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
        Err(shared) => std::mem::take(&mut *shared.lock().unwrap_or_else(PoisonError::into_inner)),
    }
}

/// Every instruction reachable from `id` through dependents
fn descendants(id: InstructionId, dependents: &HashMap<InstructionId, Vec<InstructionId>>) -> HashSet<InstructionId> {
    let mut seen = HashSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        for &next in dependents.get(&current).into_iter().flatten() {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{InfraDocument, LoadOptions, load};
    use crate::events::EventLog;
    use crate::plan::PlanBuilder;
    use crate::registry::{Plugin, Registry};
    use crate::schema::{FieldType, Schema};
    use crate::types::CommandOutput;
    use std::net::{IpAddr, Ipv4Addr};

    // ------------------------------------------------------------------------
    // Fake plugins
    // ------------------------------------------------------------------------

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl Calls {
        fn push(&self, call: String) {
            self.0.lock().unwrap().push(call);
        }

        fn all(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.all().iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    #[derive(Default)]
    struct FakeResolver {
        calls: Arc<Calls>,
        fail_create: HashSet<String>,
        partial_create: HashSet<String>,
        fail_delete: HashSet<String>,
        panic_create: HashSet<String>,
        slow_create: Option<Duration>,
        cancel_on_create: Option<CancelToken>,
    }

    impl Resolver for FakeResolver {
        fn create(&self, request: &CreateRequest, _ctx: &CallContext) -> anyhow::Result<ResolvedNode> {
            self.calls.push(format!("create {}", request.name));
            if let Some(delay) = self.slow_create {
                thread::sleep(delay);
            }
            if let Some(token) = &self.cancel_on_create {
                token.cancel();
            }
            if self.panic_create.contains(&request.name) {
                panic!("resolver bug");
            }
            let node = ResolvedNode::new(request, format!("i-{}", request.name), IpAddr::V4(Ipv4Addr::LOCALHOST));
            if self.partial_create.contains(&request.name) {
                return Err(PartiallyCreated::new(node, "disk attach failed").into());
            }
            if self.fail_create.contains(&request.name) {
                anyhow::bail!("quota exceeded");
            }
            Ok(node)
        }

        fn delete(&self, node: &ResolvedNode, _ctx: &CallContext) -> anyhow::Result<()> {
            self.calls.push(format!("delete {}", node.name));
            if self.fail_delete.contains(&node.name) {
                anyhow::bail!("instance is locked");
            }
            Ok(())
        }

        fn cmd(
            &self,
            _node: &ResolvedNode,
            _command: Option<&str>,
            _args: &[String],
            _ctx: &CallContext,
        ) -> anyhow::Result<CommandOutput> {
            anyhow::bail!("no remote shell")
        }
    }

    #[derive(Default)]
    struct FakeConfig {
        calls: Arc<Calls>,
        fail: HashSet<String>,
        undo: bool,
    }

    impl ConfigManager for FakeConfig {
        fn apply(&self, node: &NodeHandle, _section: &Section, _ctx: &CallContext) -> anyhow::Result<()> {
            self.calls.push(format!("configure {}", node.name()));
            if self.fail.contains(node.name()) {
                anyhow::bail!("package install failed");
            }
            Ok(())
        }

        fn supports_undo(&self) -> bool {
            self.undo
        }

        fn undo(&self, node: &NodeHandle, _section: &Section, _ctx: &CallContext) -> anyhow::Result<()> {
            self.calls.push(format!("undo {}", node.name()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeCheck {
        calls: Arc<Calls>,
        unhealthy: HashSet<String>,
    }

    impl HealthCheck for FakeCheck {
        fn check(&self, node: &NodeHandle, _section: &Section, _ctx: &CallContext) -> anyhow::Result<Health> {
            self.calls.push(format!("check {}", node.name()));
            if self.unhealthy.contains(node.name()) {
                return Ok(Health::unhealthy("port 80 refused"));
            }
            Ok(Health::Healthy)
        }
    }

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    struct Harness {
        calls: Arc<Calls>,
        resolver: FakeResolver,
        config: FakeConfig,
        check: FakeCheck,
    }

    impl Harness {
        fn new() -> Self {
            let calls = Arc::new(Calls::default());
            Self {
                resolver: FakeResolver {
                    calls: Arc::clone(&calls),
                    ..Default::default()
                },
                config: FakeConfig {
                    calls: Arc::clone(&calls),
                    ..Default::default()
                },
                check: FakeCheck {
                    calls: Arc::clone(&calls),
                    ..Default::default()
                },
                calls,
            }
        }

        fn registry(self) -> (Registry, Arc<Calls>) {
            let mut r = Registry::new();
            r.register("fake", Schema::new().allow_unknown(), Plugin::resolver(self.resolver))
                .unwrap();
            r.register(
                "script",
                Schema::new().optional("steps", FieldType::list(FieldType::String)),
                Plugin::config_manager(self.config),
            )
            .unwrap();
            r.register("probe", Schema::new(), Plugin::health_check(self.check))
                .unwrap();
            (r, self.calls)
        }
    }

    fn plan(registry: &Registry, src: &str) -> ExecutionPlan {
        let doc: InfraDocument = toml::from_str(src).unwrap();
        let infra = load(&doc, registry, &LoadOptions::default()).unwrap();
        PlanBuilder::new(registry).build(&infra).unwrap()
    }

    const THREE_WORKERS: &str = r#"
        infra_name = "demo"
        default_filter = "fake"
        [[nodes]]
        name = "worker"
        count = 3
    "#;

    const TWO_CHAINS: &str = r#"
        infra_name = "demo"
        default_filter = "fake"
        [[nodes]]
        name = "web"
        count = 2
        config_management = { type = "script", steps = ["install"] }
        health_check = { type = "probe" }
    "#;

    const DB_AND_WEB: &str = r#"
        infra_name = "demo"
        default_filter = "fake"
        [[nodes]]
        name = "db"
        health_check = { type = "probe" }
        [[nodes]]
        name = "web"
        depends_on = ["db"]
        health_check = { type = "probe" }
    "#;

    fn enactor(scope: RollbackScope, events: &EventLog) -> Enactor {
        Enactor::new(EnactOptions {
            jobs: 4,
            instruction_timeout: None,
            rollback_scope: scope,
        })
        .with_observer(events.clone())
    }

    fn created(events: &EventLog) -> usize {
        events.count(|k| matches!(k, EventKind::NodeCreated))
    }

    fn deleted(events: &EventLog) -> usize {
        events.count(|k| matches!(k, EventKind::NodeDeleted))
    }

    // ------------------------------------------------------------------------
    // Forward pass
    // ------------------------------------------------------------------------

    #[test]
    fn test_independent_creates_succeed() {
        let (registry, calls) = Harness::new().registry();
        let events = EventLog::new();
        let report = enactor(RollbackScope::WholeRun, &events)
            .run(plan(&registry, THREE_WORKERS))
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.waves, 1);
        assert_eq!(created(&events), 3);
        assert!(report.rollback.is_empty());
        assert_eq!(calls.count("create"), 3);
        assert_eq!(report.nodes_in(NodeStatus::Created).count(), 3);
    }

    #[test]
    fn test_chain_reaches_healthy() {
        let (registry, calls) = Harness::new().registry();
        let events = EventLog::new();
        let report = enactor(RollbackScope::WholeRun, &events)
            .run(plan(&registry, TWO_CHAINS))
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.waves, 3);
        assert_eq!(report.nodes_in(NodeStatus::Healthy).count(), 2);
        assert_eq!(calls.count("configure"), 2);
        assert_eq!(
            events.count(|k| matches!(k, EventKind::HealthCheckResult { healthy: true, .. })),
            2
        );
        assert_eq!(report.record.len(), 6);
    }

    #[test]
    fn test_family_dependency_orders_calls() {
        let (registry, calls) = Harness::new().registry();
        let report = Enactor::new(EnactOptions::default())
            .run(plan(&registry, DB_AND_WEB))
            .unwrap();
        assert!(report.is_success());
        assert_eq!(
            calls.all(),
            vec!["create demo-db-0", "check demo-db-0", "create demo-web-0", "check demo-web-0"]
        );
    }

    #[test]
    fn test_progress_callbacks() {
        #[derive(Default)]
        struct Recorder(Vec<String>);

        impl ProgressCallback for Recorder {
            fn on_wave_start(&mut self, phase: Phase, wave: usize, count: usize) {
                self.0.push(format!("{phase} wave {wave} ({count})"));
            }
            fn on_instruction_complete(&mut self, entry: &RecordEntry) {
                self.0.push(entry.description.clone());
            }
            fn on_wave_complete(&mut self, phase: Phase, wave: usize) {
                self.0.push(format!("{phase} wave {wave} done"));
            }
            fn on_rollback_start(&mut self, actions: usize) {
                self.0.push(format!("rollback ({actions})"));
            }
        }

        let (registry, _) = Harness::new().registry();
        let mut recorder = Recorder::default();
        Enactor::new(EnactOptions::default())
            .run_with_progress(plan(&registry, DB_AND_WEB), &mut recorder)
            .unwrap();
        assert_eq!(recorder.0.first().unwrap(), "forward wave 1 (1)");
        assert_eq!(recorder.0.iter().filter(|s| s.ends_with("done")).count(), 4);
        assert!(recorder.0.contains(&"create demo-web-0 (fake)".to_string()));
    }

    // ------------------------------------------------------------------------
    // Rollback
    // ------------------------------------------------------------------------

    #[test]
    fn test_configure_failure_rolls_back_whole_run() {
        let mut h = Harness::new();
        h.config.fail = set(&["demo-web-1"]);
        let (registry, calls) = h.registry();
        let events = EventLog::new();

        let report = enactor(RollbackScope::WholeRun, &events)
            .run(plan(&registry, TWO_CHAINS))
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::RolledBack);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].node_name, "demo-web-1");
        assert!(report.failures[0].error.starts_with("configuration failed for demo-web-1"));
        assert_eq!(report.skipped, 2);
        assert_eq!(calls.count("check"), 0);
        assert_eq!(calls.count("delete"), 2);
        assert_eq!(deleted(&events), 2);
        assert_eq!(report.live_nodes().count(), 0);

        let reported: Vec<_> = report
            .rollback
            .iter()
            .filter(|s| s.action == RollbackAction::Reported)
            .map(|s| s.node_name.as_str())
            .collect();
        assert_eq!(reported, vec!["demo-web-0"]);
    }

    #[test]
    fn test_failed_nodes_scope_keeps_independent_nodes() {
        let mut h = Harness::new();
        h.config.fail = set(&["demo-web-1"]);
        let (registry, calls) = h.registry();
        let events = EventLog::new();

        let report = enactor(RollbackScope::FailedNodes, &events)
            .run(plan(&registry, TWO_CHAINS))
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::RolledBack);
        assert_eq!(calls.all().iter().filter(|c| c.starts_with("delete")).collect::<Vec<_>>(), vec!["delete demo-web-1"]);
        let live: Vec<_> = report.live_nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(live, vec!["demo-web-0"]);
        assert_eq!(report.nodes_in(NodeStatus::Configured).count(), 1);
    }

    #[test]
    fn test_every_success_gets_one_action_in_reverse_order() {
        let mut h = Harness::new();
        h.check.unhealthy = set(&["demo-web-0"]);
        let (registry, _) = h.registry();
        let report = Enactor::new(EnactOptions::default())
            .run(plan(&registry, DB_AND_WEB))
            .unwrap();

        let successes: Vec<InstructionId> = report
            .record
            .successes_rev(Phase::Forward)
            .map(|e| e.instruction)
            .collect();
        let compensated: Vec<InstructionId> = report.rollback.iter().map(|s| s.compensates).collect();
        assert_eq!(compensated, successes);
        assert_eq!(successes.len(), 3);

        // web is deleted before the db it depends on
        let rollback: Vec<_> = report
            .record
            .entries()
            .iter()
            .filter(|e| e.phase == Phase::Rollback)
            .map(|e| e.description.as_str())
            .collect();
        assert_eq!(rollback, vec!["delete demo-web-0 (fake)", "delete demo-db-0 (fake)"]);
    }

    #[test]
    fn test_unhealthy_node_reported() {
        let mut h = Harness::new();
        h.check.unhealthy = set(&["demo-db-0"]);
        let (registry, _) = h.registry();
        let events = EventLog::new();
        let report = enactor(RollbackScope::WholeRun, &events)
            .run(plan(&registry, DB_AND_WEB))
            .unwrap();

        assert_eq!(report.failures[0].error, "node demo-db-0 is unhealthy: port 80 refused");
        assert_eq!(report.failures[0].kind, InstructionKind::HealthCheck);
        assert_eq!(
            events.count(|k| matches!(k, EventKind::HealthCheckResult { healthy: false, .. })),
            1
        );
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_undo_runs_before_delete() {
        let mut h = Harness::new();
        h.config.undo = true;
        h.check.unhealthy = set(&["demo-web-0"]);
        let (registry, calls) = h.registry();
        let report = Enactor::new(EnactOptions::default())
            .run(plan(&registry, TWO_CHAINS))
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::RolledBack);
        let all = calls.all();
        let pos = |c: &str| all.iter().position(|x| x == c).unwrap();
        assert!(pos("undo demo-web-0") < pos("delete demo-web-0"));
        assert!(pos("undo demo-web-1") < pos("delete demo-web-1"));
        assert_eq!(
            report
                .rollback
                .iter()
                .filter(|s| s.action == RollbackAction::UndoConfigure)
                .count(),
            2
        );
    }

    #[test]
    fn test_partially_created_node_is_deleted() {
        let mut h = Harness::new();
        h.resolver.partial_create = set(&["demo-worker-1"]);
        let (registry, calls) = h.registry();
        let events = EventLog::new();
        let report = enactor(RollbackScope::FailedNodes, &events)
            .run(plan(&registry, THREE_WORKERS))
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::RolledBack);
        assert_eq!(calls.count("delete demo-worker-1"), 1);
        assert_eq!(calls.count("delete"), 1);
        assert_eq!(report.failures[0].error, "create failed for demo-worker-1: disk attach failed");
        let partial = report.nodes.iter().find(|n| n.name == "demo-worker-1").unwrap();
        assert_eq!(partial.status(), NodeStatus::Deleted);
    }

    #[test]
    fn test_failed_create_without_partial_node() {
        let mut h = Harness::new();
        h.resolver.fail_create = set(&["demo-worker-2"]);
        let (registry, calls) = h.registry();
        let report = Enactor::new(EnactOptions::default())
            .run(plan(&registry, THREE_WORKERS))
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::RolledBack);
        assert_eq!(calls.count("delete"), 2);
        assert_eq!(calls.count("delete demo-worker-2"), 0);
    }

    #[test]
    fn test_rollback_failure_is_surfaced() {
        let mut h = Harness::new();
        h.check.unhealthy = set(&["demo-web-0"]);
        h.resolver.fail_delete = set(&["demo-web-0"]);
        let (registry, calls) = h.registry();

        let err = Enactor::new(EnactOptions::default())
            .run(plan(&registry, DB_AND_WEB))
            .unwrap_err();

        let Error::RollbackIncomplete { failures, report } = &err else {
            panic!("expected incomplete rollback, got {err}");
        };
        assert_eq!(failures.len(), 2);
        assert_eq!(report.outcome, RunOutcome::RollbackIncomplete);
        assert_eq!(calls.count("delete demo-db-0"), 0);
        let statuses: Vec<_> = report.rollback_failures().map(|s| s.node_name.as_str()).collect();
        assert_eq!(statuses, vec!["demo-web-0", "demo-db-0"]);
        assert!(err.report().is_some());
    }

    #[test]
    fn test_panicking_plugin_becomes_failure() {
        let mut h = Harness::new();
        h.resolver.panic_create = set(&["demo-worker-0"]);
        let (registry, _) = h.registry();
        let report = Enactor::new(EnactOptions::default())
            .run(plan(&registry, THREE_WORKERS))
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::RolledBack);
        assert_eq!(report.failures[0].error, "create failed for demo-worker-0: plugin panicked");
    }

    #[test]
    fn test_observer_failure_does_not_abort() {
        let (registry, _) = Harness::new().registry();
        let report = Enactor::new(EnactOptions::default())
            .with_observer(|_: &Event| -> anyhow::Result<()> { anyhow::bail!("hook offline") })
            .run(plan(&registry, THREE_WORKERS))
            .unwrap();
        assert!(report.is_success());
    }

    // ------------------------------------------------------------------------
    // Timeouts, cancellation, teardown
    // ------------------------------------------------------------------------

    #[test]
    fn test_instruction_timeout() {
        let mut h = Harness::new();
        h.resolver.slow_create = Some(Duration::from_millis(500));
        let (registry, _) = h.registry();
        let report = Enactor::new(EnactOptions {
            instruction_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        })
        .run(plan(&registry, THREE_WORKERS))
        .unwrap();

        assert_eq!(report.outcome, RunOutcome::RolledBack);
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures.iter().all(|f| f.error.contains("timed out")));
    }

    #[test]
    fn test_cancel_waits_for_in_flight_then_rolls_back() {
        let cancel = CancelToken::new();
        let mut h = Harness::new();
        h.resolver.cancel_on_create = Some(cancel.clone());
        let (registry, calls) = h.registry();
        let events = EventLog::new();

        let report = enactor(RollbackScope::WholeRun, &events)
            .with_cancel_token(cancel)
            .run(plan(&registry, DB_AND_WEB))
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.outcome, RunOutcome::RolledBack);
        assert_eq!(report.waves, 1);
        assert_eq!(calls.all(), vec!["create demo-db-0", "delete demo-db-0"]);
        assert_eq!(created(&events), 1);
        assert_eq!(deleted(&events), 1);
        assert_eq!(report.skipped, 3);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (registry, calls) = Harness::new().registry();
        let events = EventLog::new();
        let enactor = enactor(RollbackScope::WholeRun, &events);

        let first = enactor.run(plan(&registry, THREE_WORKERS)).unwrap();
        let mut nodes = first.nodes.clone();
        nodes[0].advance(NodeStatus::Deleted);

        let teardown = PlanBuilder::new(&registry)
            .teardown("demo", nodes, None)
            .unwrap();
        let report = enactor.run(teardown).unwrap();

        assert!(report.is_success());
        assert_eq!(calls.count("delete"), 2);
        assert_eq!(deleted(&events), 2);
        assert_eq!(report.nodes_in(NodeStatus::Deleted).count(), 3);
    }

    #[test]
    fn test_single_job_pool_runs_sequentially() {
        let (registry, _) = Harness::new().registry();
        let report = Enactor::new(EnactOptions {
            jobs: 1,
            ..Default::default()
        })
        .run(plan(&registry, THREE_WORKERS))
        .unwrap();
        assert!(report.is_success());
        assert_eq!(report.record.len(), 3);
    }

    #[test]
    fn test_descendants() {
        let mut dependents = HashMap::new();
        dependents.insert(InstructionId(0), vec![InstructionId(1)]);
        dependents.insert(InstructionId(1), vec![InstructionId(2), InstructionId(3)]);
        let d = descendants(InstructionId(0), &dependents);
        assert_eq!(d.len(), 3);
        assert!(descendants(InstructionId(3), &dependents).is_empty());
    }

    #[test]
    fn test_missing_node_fails_as_instruction_error() {
        let outcome = perform(
            Work::Missing,
            &CallContext::default(),
            InstructionKind::Delete,
            "demo-web-0",
        );
        let Outcome::Failed { error, partial } = outcome else {
            panic!("a missing node must fail the instruction");
        };
        assert!(partial.is_none());
        assert!(error.is_instruction_error());
        match error {
            Error::Delete { node, message } => {
                assert_eq!(node, "demo-web-0");
                assert_eq!(message, "the node was never created");
            }
            other => panic!("expected a delete error, got {other}"),
        }
    }
}
