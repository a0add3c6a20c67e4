//! Node definition model
//!
//! An infrastructure document is parsed by the caller into an
//! [`InfraDocument`] and turned into a validated [`Infrastructure`] by
//! [`load`]. Loading checks everything that can be checked without touching a
//! backend: names, counts, templates, family dependencies, and every plugin
//! section against the schema of the plugin it names. Nothing in an
//! `Infrastructure` changes after `load` returns.

use crate::error::{Error, Result};
use crate::naming::{self, DEFAULT_MAX_LEN, NameContext, NameRegistry, NameTemplate};
use crate::registry::{PluginKind, Registry};
use crate::schema::{Params, SchemaError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Document model
// ============================================================================

/// An infrastructure as written in a definition file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfraDocument {
    pub infra_name: String,
    /// Extra input to node ids and the `{seed}` placeholder
    #[serde(default)]
    pub seed: Option<String>,
    /// Maximum generated name length for this infrastructure
    #[serde(default)]
    pub name_max_len: Option<usize>,
    /// Resolver used by nodes without a `filter`
    #[serde(default)]
    pub default_filter: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
}

/// One node family as written in a definition file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDocument {
    pub name: String,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub name_template: Option<String>,
    /// Resolver plugin that creates these nodes
    #[serde(default)]
    pub filter: Option<String>,
    /// Resolver parameters
    #[serde(default)]
    pub resource: Params,
    #[serde(default)]
    pub contextualisation: Option<Section>,
    #[serde(default)]
    pub config_management: Option<Section>,
    #[serde(default)]
    pub health_check: Option<Section>,
    /// Families whose nodes must be ready before these are created
    #[serde(default)]
    pub depends_on: Vec<String>,
}

fn default_count() -> usize {
    1
}

/// A plugin section: the `type` key names the plugin, the rest configures it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub plugin: String,
    #[serde(flatten)]
    pub config: Params,
}

impl Section {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            config: Params::new(),
        }
    }

    /// Builder-style setter for one configuration key
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }
}

/// Which section of a node family a plugin configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionRole {
    Contextualisation,
    ConfigManagement,
    HealthCheck,
}

impl SectionRole {
    fn kind(self) -> PluginKind {
        match self {
            Self::Contextualisation | Self::ConfigManagement => PluginKind::ConfigManagement,
            Self::HealthCheck => PluginKind::HealthCheck,
        }
    }
}

impl fmt::Display for SectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contextualisation => write!(f, "contextualisation"),
            Self::ConfigManagement => write!(f, "config_management"),
            Self::HealthCheck => write!(f, "health_check"),
        }
    }
}

// ============================================================================
// Validated model
// ============================================================================

/// A validated node family
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDefinition {
    /// Family name, unique within the infrastructure
    pub name: String,
    pub infra_name: String,
    pub count: usize,
    pub template: NameTemplate,
    /// Filter as declared, `None` when the default applied
    pub filter: Option<String>,
    /// Resolver plugin actually used
    pub resolver: String,
    pub resource: Params,
    pub contextualisation: Option<Section>,
    pub config_management: Option<Section>,
    pub health_check: Option<Section>,
    pub depends_on: Vec<String>,
}

/// One node to be created: a family member with its generated name
#[derive(Debug, Clone)]
pub struct NodeInstance {
    pub definition: Arc<NodeDefinition>,
    pub index: usize,
    pub name: String,
    pub node_id: String,
}

/// Options that apply when the document does not say otherwise
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub default_filter: Option<String>,
    pub name_max_len: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            default_filter: None,
            name_max_len: DEFAULT_MAX_LEN,
        }
    }
}

/// A validated infrastructure
#[derive(Debug, Clone)]
pub struct Infrastructure {
    infra_name: String,
    seed: String,
    name_max_len: usize,
    nodes: Vec<Arc<NodeDefinition>>,
    instances: Vec<NodeInstance>,
}

impl Infrastructure {
    pub fn infra_name(&self) -> &str {
        &self.infra_name
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn name_max_len(&self) -> usize {
        self.name_max_len
    }

    /// Node families, every family after the families it depends on
    pub fn nodes(&self) -> &[Arc<NodeDefinition>] {
        &self.nodes
    }

    pub fn node(&self, family: &str) -> Option<&Arc<NodeDefinition>> {
        self.nodes.iter().find(|n| n.name == family)
    }

    /// Every node to create, in family order then index order
    pub fn instances(&self) -> &[NodeInstance] {
        &self.instances
    }
}

/// Validate a document against the registered plugins
pub fn load(doc: &InfraDocument, registry: &Registry, opts: &LoadOptions) -> Result<Infrastructure> {
    let infra_name = doc.infra_name.trim();
    if infra_name.is_empty() {
        return Err(SchemaError::invalid("infrastructure", "infra_name", "must not be empty").into());
    }

    let mut seen = HashSet::new();
    for node in &doc.nodes {
        if node.name.trim().is_empty() {
            return Err(SchemaError::invalid(
                format!("infrastructure '{infra_name}'"),
                "nodes[].name",
                "must not be empty",
            )
            .into());
        }
        if !seen.insert(node.name.as_str()) {
            return Err(SchemaError::invalid(
                format!("infrastructure '{infra_name}'"),
                format!("nodes.{}", node.name),
                "node family declared more than once",
            )
            .into());
        }
    }

    let default_filter = doc.default_filter.as_deref().or(opts.default_filter.as_deref());
    let mut definitions: HashMap<&str, Arc<NodeDefinition>> = HashMap::new();
    for node in &doc.nodes {
        let def = validate_node(infra_name, node, &seen, default_filter, registry)?;
        definitions.insert(node.name.as_str(), Arc::new(def));
    }

    let order = topological_order(&doc.nodes)?;
    let nodes: Vec<Arc<NodeDefinition>> = order
        .into_iter()
        .filter_map(|i| definitions.get(doc.nodes[i].name.as_str()).cloned())
        .collect();

    let seed = doc.seed.clone().unwrap_or_default();
    let name_max_len = doc.name_max_len.unwrap_or(opts.name_max_len);
    if name_max_len == 0 {
        return Err(SchemaError::invalid(
            format!("infrastructure '{infra_name}'"),
            "name_max_len",
            "must be at least 1",
        )
        .into());
    }

    let mut names = NameRegistry::new(name_max_len);
    let mut instances = Vec::new();
    for def in &nodes {
        for index in 0..def.count {
            let rendered = def.template.render(&NameContext {
                infra: infra_name,
                name: &def.name,
                index,
                seed: &seed,
            });
            let name = names.claim(&rendered)?;
            let node_id = naming::node_id(infra_name, &seed, &name);
            instances.push(NodeInstance {
                definition: Arc::clone(def),
                index,
                name,
                node_id,
            });
        }
    }

    log::debug!(
        "loaded infrastructure '{infra_name}': {} node family(ies), {} node(s)",
        nodes.len(),
        instances.len()
    );

    Ok(Infrastructure {
        infra_name: infra_name.to_string(),
        seed,
        name_max_len,
        nodes,
        instances,
    })
}

fn validate_node(
    infra_name: &str,
    node: &NodeDocument,
    families: &HashSet<&str>,
    default_filter: Option<&str>,
    registry: &Registry,
) -> Result<NodeDefinition> {
    let context = format!("node family '{}'", node.name);

    if node.count == 0 {
        return Err(SchemaError::invalid(context, "count", "must be at least 1").into());
    }

    let template = match &node.name_template {
        Some(t) => NameTemplate::parse(t)?,
        None => NameTemplate::default(),
    };
    if node.count > 1 && !template.uses_index() {
        return Err(Error::Template {
            template: template.to_string(),
            message: format!(
                "node family '{}' has {} instances but the template has no {{index}}",
                node.name, node.count
            ),
        });
    }

    let mut depends_on = Vec::new();
    for dep in &node.depends_on {
        if dep == &node.name {
            return Err(SchemaError::invalid(context, "depends_on", "a node family cannot depend on itself").into());
        }
        if !families.contains(dep.as_str()) {
            return Err(SchemaError::invalid(context, "depends_on", format!("unknown node family '{dep}'")).into());
        }
        if !depends_on.contains(dep) {
            depends_on.push(dep.clone());
        }
    }

    let resolver = node
        .filter
        .as_deref()
        .or(default_filter)
        .ok_or_else(|| SchemaError::invalid(context.clone(), "filter", "no filter given and no default resolver configured"))?;
    let descriptor = registry.descriptor(resolver, PluginKind::Resolver)?;
    descriptor
        .schema
        .validate(&format!("resource of {context} (resolver '{resolver}')"), &node.resource)?;

    for (role, section) in [
        (SectionRole::Contextualisation, &node.contextualisation),
        (SectionRole::ConfigManagement, &node.config_management),
        (SectionRole::HealthCheck, &node.health_check),
    ] {
        if let Some(section) = section {
            validate_section(&context, role, section, registry)?;
        }
    }

    Ok(NodeDefinition {
        name: node.name.clone(),
        infra_name: infra_name.to_string(),
        count: node.count,
        template,
        filter: node.filter.clone(),
        resolver: resolver.to_string(),
        resource: node.resource.clone(),
        contextualisation: node.contextualisation.clone(),
        config_management: node.config_management.clone(),
        health_check: node.health_check.clone(),
        depends_on,
    })
}

fn validate_section(context: &str, role: SectionRole, section: &Section, registry: &Registry) -> Result<()> {
    if section.plugin.trim().is_empty() {
        return Err(SchemaError::invalid(context, format!("{role}.type"), "must name a plugin").into());
    }
    let descriptor = registry.descriptor(&section.plugin, role.kind())?;
    descriptor.schema.validate(
        &format!("{role} '{}' of {context}", section.plugin),
        &section.config,
    )?;
    Ok(())
}

/// Order families so that each comes after its dependencies
///
/// Declaration order is kept wherever dependencies allow it.
fn topological_order(nodes: &[NodeDocument]) -> Result<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(
        i: usize,
        nodes: &[NodeDocument],
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::Active => {
                let start = path.iter().position(|&p| p == i).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|&p| nodes[p].name.clone()).collect();
                cycle.push(nodes[i].name.clone());
                return Err(Error::DependencyCycle(cycle));
            }
            Mark::New => {}
        }
        marks[i] = Mark::Active;
        path.push(i);
        for dep in &nodes[i].depends_on {
            if let Some(&d) = index.get(dep.as_str()) {
                visit(d, nodes, index, marks, path, order)?;
            }
        }
        path.pop();
        marks[i] = Mark::Done;
        order.push(i);
        Ok(())
    }

    let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, n)| (n.name.as_str(), i)).collect();
    let mut marks = vec![Mark::New; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    let mut path = Vec::new();
    for i in 0..nodes.len() {
        visit(i, nodes, &index, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}
