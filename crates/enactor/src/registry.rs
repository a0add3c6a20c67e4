//! Plugin registry
//!
//! Plugins register under a name and a capability kind together with the
//! [`Schema`] of the configuration section they accept. Lookups are by
//! `(kind, name)`, so a resolver and a health check may share a name.

use crate::error::{Error, Result};
use crate::plugin::{ConfigManager, HealthCheck, Resolver};
use crate::schema::{Params, Schema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Capability a plugin provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    Resolver,
    ConfigManagement,
    HealthCheck,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolver => write!(f, "resolver"),
            Self::ConfigManagement => write!(f, "config-management"),
            Self::HealthCheck => write!(f, "health-check"),
        }
    }
}

/// A registered plugin implementation
#[derive(Clone)]
pub enum Plugin {
    Resolver(Arc<dyn Resolver>),
    ConfigManager(Arc<dyn ConfigManager>),
    HealthCheck(Arc<dyn HealthCheck>),
}

impl Plugin {
    pub fn resolver(p: impl Resolver + 'static) -> Self {
        Self::Resolver(Arc::new(p))
    }

    pub fn config_manager(p: impl ConfigManager + 'static) -> Self {
        Self::ConfigManager(Arc::new(p))
    }

    pub fn health_check(p: impl HealthCheck + 'static) -> Self {
        Self::HealthCheck(Arc::new(p))
    }

    pub fn kind(&self) -> PluginKind {
        match self {
            Self::Resolver(_) => PluginKind::Resolver,
            Self::ConfigManager(_) => PluginKind::ConfigManagement,
            Self::HealthCheck(_) => PluginKind::HealthCheck,
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plugin({})", self.kind())
    }
}

/// Name, capability and configuration schema of a plugin
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub kind: PluginKind,
    pub schema: Schema,
}

#[derive(Debug, Clone)]
struct Entry {
    descriptor: PluginDescriptor,
    plugin: Plugin,
}

/// Plugins available to plan building, keyed by kind and name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<(PluginKind, String), Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin; the capability kind comes from the plugin itself
    pub fn register(&mut self, name: impl Into<String>, schema: Schema, plugin: Plugin) -> Result<()> {
        let name = name.into();
        let kind = plugin.kind();
        let key = (kind, name.clone());
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicatePlugin { name, kind });
        }
        log::debug!("registered {kind} plugin '{name}'");
        self.entries.insert(
            key,
            Entry {
                descriptor: PluginDescriptor { name, kind, schema },
                plugin,
            },
        );
        Ok(())
    }

    fn entry(&self, name: &str, kind: PluginKind) -> Result<&Entry> {
        self.entries
            .get(&(kind, name.to_string()))
            .ok_or_else(|| Error::PluginNotFound {
                name: name.to_string(),
                kind,
            })
    }

    pub fn descriptor(&self, name: &str, kind: PluginKind) -> Result<&PluginDescriptor> {
        self.entry(name, kind).map(|e| &e.descriptor)
    }

    pub fn resolve_plugin(&self, name: &str, kind: PluginKind) -> Result<Plugin> {
        self.entry(name, kind).map(|e| e.plugin.clone())
    }

    pub fn resolver(&self, name: &str) -> Result<Arc<dyn Resolver>> {
        match self.resolve_plugin(name, PluginKind::Resolver)? {
            Plugin::Resolver(p) => Ok(p),
            other => Err(mismatch(name, &other)),
        }
    }

    pub fn config_manager(&self, name: &str) -> Result<Arc<dyn ConfigManager>> {
        match self.resolve_plugin(name, PluginKind::ConfigManagement)? {
            Plugin::ConfigManager(p) => Ok(p),
            other => Err(mismatch(name, &other)),
        }
    }

    pub fn health_check(&self, name: &str) -> Result<Arc<dyn HealthCheck>> {
        match self.resolve_plugin(name, PluginKind::HealthCheck)? {
            Plugin::HealthCheck(p) => Ok(p),
            other => Err(mismatch(name, &other)),
        }
    }

    /// Check `config` against the schema `name` registered with
    pub fn validate_config(&self, name: &str, kind: PluginKind, config: &Params) -> Result<()> {
        let descriptor = self.descriptor(name, kind)?;
        descriptor
            .schema
            .validate(&format!("{kind} '{name}' configuration"), config)?;
        Ok(())
    }

    /// All descriptors, ordered by kind then name
    pub fn descriptors(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.entries.values().map(|e| &e.descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn mismatch(name: &str, plugin: &Plugin) -> Error {
    Error::Internal(format!(
        "plugin '{name}' is stored under the wrong capability ({})",
        plugin.kind()
    ))
}
