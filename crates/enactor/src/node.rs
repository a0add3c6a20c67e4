//! Resolved nodes and their lifecycle status

use crate::plugin::CreateRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Lifecycle status of a node
///
/// Forward progress is `pending -> created -> configured -> healthy`. The
/// terminal `failed` and `deleted` states are reachable from anywhere except
/// `deleted`, which nothing leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Created,
    Configured,
    Healthy,
    Failed,
    Deleted,
}

impl NodeStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Created => 1,
            Self::Configured => 2,
            Self::Healthy => 3,
            Self::Failed | Self::Deleted => 4,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Deleted, _) => next == Self::Deleted,
            (Self::Failed, _) => matches!(next, Self::Failed | Self::Deleted),
            (_, Self::Failed | Self::Deleted) => true,
            _ => next.rank() >= self.rank(),
        }
    }

    /// Whether the node still exists on its backend
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Pending | Self::Deleted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::Configured => "configured",
            Self::Healthy => "healthy",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instantiated node on a backend
///
/// Built by a resolver's `create`. After that only the Enactor changes it,
/// and only its status. Deserializing rejects a node without addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredNode")]
pub struct ResolvedNode {
    /// Deterministic identifier assigned at plan time
    pub node_id: String,
    /// Generated node name
    pub name: String,
    /// Node family the node was generated from
    pub family: String,
    pub infra_name: String,
    /// Resolver that created the node
    pub resolver: String,
    /// Backend-specific instance identifier
    pub instance_id: String,
    addresses: Vec<IpAddr>,
    private_address: Option<IpAddr>,
    startup_time: DateTime<Utc>,
    status: NodeStatus,
}

/// Serialized form of [`ResolvedNode`], checked before it becomes one
#[derive(Deserialize)]
struct StoredNode {
    node_id: String,
    name: String,
    family: String,
    infra_name: String,
    resolver: String,
    instance_id: String,
    addresses: Vec<IpAddr>,
    private_address: Option<IpAddr>,
    startup_time: DateTime<Utc>,
    status: NodeStatus,
}

impl TryFrom<StoredNode> for ResolvedNode {
    type Error = String;

    fn try_from(stored: StoredNode) -> Result<Self, Self::Error> {
        if stored.addresses.is_empty() {
            return Err(format!("node '{}' has no addresses", stored.name));
        }
        Ok(Self {
            node_id: stored.node_id,
            name: stored.name,
            family: stored.family,
            infra_name: stored.infra_name,
            resolver: stored.resolver,
            instance_id: stored.instance_id,
            addresses: stored.addresses,
            private_address: stored.private_address,
            startup_time: stored.startup_time,
            status: stored.status,
        })
    }
}

impl ResolvedNode {
    /// Create a node record for a freshly created instance
    pub fn new(request: &CreateRequest, instance_id: impl Into<String>, primary: IpAddr) -> Self {
        Self {
            node_id: request.node_id.clone(),
            name: request.name.clone(),
            family: request.definition.name.clone(),
            infra_name: request.definition.infra_name.clone(),
            resolver: request.definition.resolver.clone(),
            instance_id: instance_id.into(),
            addresses: vec![primary],
            private_address: None,
            startup_time: Utc::now(),
            status: NodeStatus::Created,
        }
    }

    /// Append further addresses after the primary one
    ///
    /// Duplicates of addresses already present are ignored so the list
    /// stays a set in resolver-defined order.
    #[must_use]
    pub fn with_addresses(mut self, extra: impl IntoIterator<Item = IpAddr>) -> Self {
        for addr in extra {
            if !self.addresses.contains(&addr) {
                self.addresses.push(addr);
            }
        }
        self
    }

    #[must_use]
    pub fn with_private_address(mut self, addr: IpAddr) -> Self {
        self.private_address = Some(addr);
        self
    }

    /// Canonical address, always the first of [`addresses`](Self::addresses)
    pub fn primary_address(&self) -> IpAddr {
        self.addresses[0]
    }

    /// All known addresses, primary first
    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    /// Private address, falling back to the primary one
    pub fn private_address(&self) -> IpAddr {
        self.private_address.unwrap_or_else(|| self.primary_address())
    }

    pub fn startup_time(&self) -> DateTime<Utc> {
        self.startup_time
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Move to `next` if the lifecycle allows it
    pub(crate) fn advance(&mut self, next: NodeStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            log::warn!(
                "ignoring status change {} -> {} for {}",
                self.status,
                next,
                self.name
            );
            false
        }
    }
}
