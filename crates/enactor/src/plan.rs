//! Execution plans
//!
//! A plan is a DAG of instructions over a fixed set of node slots. Each slot
//! is one node: either a node the plan will create, or an existing node a
//! teardown plan will delete. Plans are built by [`PlanBuilder`], which binds
//! every instruction to its plugin; the Enactor consumes them.

use crate::definition::{Infrastructure, NodeDefinition};
use crate::error::{Error, Result};
use crate::instruction::{ConfigStage, Instruction, InstructionId, InstructionKind, Operation};
use crate::node::ResolvedNode;
use crate::plugin::{CreateRequest, Resolver};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Index of a node slot within a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// One node a plan acts on
#[derive(Clone)]
pub struct NodeSlot {
    pub id: SlotId,
    pub name: String,
    pub node_id: String,
    pub family: String,
    pub index: usize,
    pub resolver_name: String,
    pub resolver: Arc<dyn Resolver>,
    /// Node the slot starts with (teardown plans)
    pub existing: Option<ResolvedNode>,
}

impl fmt::Debug for NodeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSlot")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("family", &self.family)
            .field("resolver", &self.resolver_name)
            .field("existing", &self.existing.as_ref().map(|n| n.status()))
            .finish_non_exhaustive()
    }
}

/// A partial order over instructions
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    infra_name: String,
    slots: Vec<NodeSlot>,
    instructions: Vec<Instruction>,
}

impl ExecutionPlan {
    pub fn infra_name(&self) -> &str {
        &self.infra_name
    }

    pub fn slots(&self) -> &[NodeSlot] {
        &self.slots
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, id: InstructionId) -> Option<&Instruction> {
        self.instructions.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn count(&self, kind: InstructionKind) -> usize {
        self.instructions.iter().filter(|i| i.kind == kind).count()
    }

    /// Static wave partition: what runs together when nothing fails
    ///
    /// Wave `n` holds every instruction whose dependencies all sit in waves
    /// before `n`.
    pub fn waves(&self) -> Vec<Vec<InstructionId>> {
        wave_partition(&self.instructions)
    }

    pub(crate) fn into_parts(self) -> (String, Vec<NodeSlot>, Vec<Instruction>) {
        (self.infra_name, self.slots, self.instructions)
    }
}

/// Kahn levels over a set of instructions whose ids are their indices
pub(crate) fn wave_partition(instructions: &[Instruction]) -> Vec<Vec<InstructionId>> {
    let mut level: Vec<Option<usize>> = vec![None; instructions.len()];
    let mut waves: Vec<Vec<InstructionId>> = Vec::new();
    let mut placed = 0;

    while placed < instructions.len() {
        let current = waves.len();
        let ready: Vec<InstructionId> = instructions
            .iter()
            .filter(|i| level[i.id.0].is_none())
            .filter(|i| {
                i.depends_on
                    .iter()
                    .all(|d| level.get(d.0).copied().flatten().is_some_and(|l| l < current))
            })
            .map(|i| i.id)
            .collect();
        if ready.is_empty() {
            break;
        }
        for id in &ready {
            level[id.0] = Some(current);
        }
        placed += ready.len();
        waves.push(ready);
    }
    waves
}

/// Builds plans, binding each instruction to a registered plugin
pub struct PlanBuilder<'a> {
    registry: &'a Registry,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Provisioning plan: create, configure and check every node
    ///
    /// Each node gets the chain create -> contextualisation ->
    /// config_management -> health_check, skipping absent sections. Every
    /// instruction of a family that depends on another family waits for the
    /// last instruction of each node of that family.
    pub fn build(&self, infra: &Infrastructure) -> Result<ExecutionPlan> {
        let mut slots = Vec::new();
        let mut instructions: Vec<Instruction> = Vec::new();
        let mut terminals: HashMap<&str, Vec<InstructionId>> = HashMap::new();

        for instance in infra.instances() {
            let def = &instance.definition;
            let resolver = self.registry.resolver(&def.resolver)?;
            let slot = SlotId(slots.len());
            slots.push(NodeSlot {
                id: slot,
                name: instance.name.clone(),
                node_id: instance.node_id.clone(),
                family: def.name.clone(),
                index: instance.index,
                resolver_name: def.resolver.clone(),
                resolver,
                existing: None,
            });

            let family_deps: BTreeSet<InstructionId> = def
                .depends_on
                .iter()
                .filter_map(|dep| terminals.get(dep.as_str()))
                .flatten()
                .copied()
                .collect();

            let mut push = |kind: InstructionKind, plugin: &str, op: Operation, prev: Option<InstructionId>| {
                let id = InstructionId(instructions.len());
                let mut depends_on = family_deps.clone();
                depends_on.extend(prev);
                instructions.push(Instruction {
                    id,
                    kind,
                    slot,
                    node_name: instance.name.clone(),
                    plugin: plugin.to_string(),
                    op,
                    depends_on,
                    compensates: None,
                });
                id
            };

            let request = CreateRequest {
                node_id: instance.node_id.clone(),
                name: instance.name.clone(),
                index: instance.index,
                definition: Arc::clone(def),
            };
            let mut last = push(InstructionKind::Create, &def.resolver, Operation::Create(request), None);

            for (stage, section) in config_stages(def) {
                let manager = self.registry.config_manager(&section.plugin)?;
                let op = Operation::Configure {
                    stage,
                    section: section.clone(),
                    manager,
                };
                last = push(InstructionKind::Configure, &section.plugin, op, Some(last));
            }

            if let Some(section) = &def.health_check {
                let checker = self.registry.health_check(&section.plugin)?;
                let op = Operation::HealthCheck {
                    section: section.clone(),
                    checker,
                };
                last = push(InstructionKind::HealthCheck, &section.plugin, op, Some(last));
            }

            terminals.entry(def.name.as_str()).or_default().push(last);
        }

        log::debug!(
            "built plan for '{}': {} instruction(s) over {} node(s)",
            infra.infra_name(),
            instructions.len(),
            slots.len()
        );

        Ok(ExecutionPlan {
            infra_name: infra.infra_name().to_string(),
            slots,
            instructions,
        })
    }

    /// Teardown plan: delete existing nodes
    ///
    /// With the infrastructure the nodes came from, a family is deleted only
    /// after every family depending on it. Nodes already `deleted` still get
    /// an instruction; it completes as a no-op.
    pub fn teardown(
        &self,
        infra_name: &str,
        nodes: Vec<ResolvedNode>,
        infra: Option<&Infrastructure>,
    ) -> Result<ExecutionPlan> {
        let mut slots = Vec::new();
        let mut instructions = Vec::new();
        let mut by_family: HashMap<String, Vec<InstructionId>> = HashMap::new();

        for node in nodes {
            let resolver = self.registry.resolver(&node.resolver)?;
            let slot = SlotId(slots.len());
            let id = InstructionId(instructions.len());
            by_family.entry(node.family.clone()).or_default().push(id);
            instructions.push(Instruction {
                id,
                kind: InstructionKind::Delete,
                slot,
                node_name: node.name.clone(),
                plugin: node.resolver.clone(),
                op: Operation::Delete,
                depends_on: BTreeSet::new(),
                compensates: None,
            });
            slots.push(NodeSlot {
                id: slot,
                name: node.name.clone(),
                node_id: node.node_id.clone(),
                family: node.family.clone(),
                index: 0,
                resolver_name: node.resolver.clone(),
                resolver,
                existing: Some(node),
            });
        }

        if let Some(infra) = infra {
            for dependent in infra.nodes() {
                let Some(dependent_deletes) = by_family.get(&dependent.name) else {
                    continue;
                };
                for dep in &dependent.depends_on {
                    if let Some(dep_deletes) = by_family.get(dep) {
                        for &d in dep_deletes {
                            instructions[d.0].depends_on.extend(dependent_deletes.iter().copied());
                        }
                    }
                }
            }
        }

        if wave_partition(&instructions).iter().map(Vec::len).sum::<usize>() != instructions.len() {
            return Err(Error::Internal(
                "teardown ordering contains a dependency cycle".to_string(),
            ));
        }

        Ok(ExecutionPlan {
            infra_name: infra_name.to_string(),
            slots,
            instructions,
        })
    }
}

fn config_stages(def: &NodeDefinition) -> impl Iterator<Item = (ConfigStage, &crate::definition::Section)> {
    [
        (ConfigStage::Contextualisation, def.contextualisation.as_ref()),
        (ConfigStage::ConfigManagement, def.config_management.as_ref()),
    ]
    .into_iter()
    .filter_map(|(stage, section)| section.map(|s| (stage, s)))
}
