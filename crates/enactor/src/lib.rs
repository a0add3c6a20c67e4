//! # Enactor
//!
//! Instruction execution engine for node-based infrastructures.
//!
//! An infrastructure is a set of node families. Each family is instantiated
//! into one or more nodes, and every node goes through the same lifecycle:
//! create, contextualise, configure, health-check. This crate turns the
//! declaration into a partial order of instructions and runs it in parallel
//! waves, rolling back what already happened if anything fails.
//!
//! ## Core Concepts
//!
//! - **Registry**: named plugins per capability (resolver, config management,
//!   health check), each with a configuration schema
//! - **Infrastructure**: validated node families, loaded from an
//!   [`InfraDocument`] with [`load`]
//! - **ExecutionPlan**: instructions plus their dependencies, built by
//!   [`PlanBuilder`]
//! - **Enactor**: runs a plan and produces a [`RunReport`]
//!
//! ## Example
//!
//! ```ignore
//! use enactor::{Enactor, EnactOptions, LoadOptions, LogObserver, PlanBuilder, Registry, load};
//!
//! let mut registry = Registry::new();
//! registry.register("local", local_schema(), Plugin::resolver(LocalResolver::new()))?;
//!
//! let doc: InfraDocument = toml::from_str(&std::fs::read_to_string("infra.toml")?)?;
//! let infra = load(&doc, &registry, &LoadOptions::default())?;
//! let plan = PlanBuilder::new(&registry).build(&infra)?;
//!
//! let report = Enactor::new(EnactOptions::default())
//!     .with_observer(LogObserver)
//!     .run(plan)?;
//! println!("{}", report.outcome);
//! ```
//!
//! ## Provider Traits
//!
//! Plugins implement [`Resolver`], [`ConfigManager`] or [`HealthCheck`].
//! Callers watch a run through [`ProgressCallback`] and [`Observer`], so the
//! crate has no dependency on any terminal UI or notification transport.

pub mod context;
pub mod definition;
pub mod enactor;
pub mod error;
pub mod events;
pub mod instruction;
pub mod naming;
pub mod node;
pub mod plan;
pub mod plugin;
pub mod record;
pub mod registry;
pub mod schema;
pub mod types;

// Re-export main types at crate root
pub use context::{CallContext, CancelToken, NoProgress, ProgressCallback};
pub use definition::{
    InfraDocument, Infrastructure, LoadOptions, NodeDefinition, NodeDocument, NodeInstance,
    Section, load,
};
pub use enactor::Enactor;
pub use error::{Error, Result};
pub use events::{Event, EventKind, EventLog, LogObserver, Notifier, Observer};
pub use instruction::{ConfigStage, Instruction, InstructionId, InstructionKind, Operation};
pub use naming::{NameRegistry, NameTemplate};
pub use node::{NodeStatus, ResolvedNode};
pub use plan::{ExecutionPlan, NodeSlot, PlanBuilder, SlotId};
pub use plugin::{
    ConfigManager, CreateRequest, Health, HealthCheck, NodeHandle, PartiallyCreated, Resolver,
};
pub use record::{EntryOutcome, ExecutionRecord, Phase, RecordEntry};
pub use registry::{Plugin, PluginDescriptor, PluginKind, Registry};
pub use schema::{FieldType, Params, Schema, SchemaError, Violation};
pub use types::{
    CommandOutput, EnactOptions, InstructionFailure, RollbackAction, RollbackScope, RollbackStep,
    RunOutcome, RunReport, StepStatus,
};
