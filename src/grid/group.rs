//! Grid Groups
//!
//! A group owns a set of node identifiers. Membership of a node in at most
//! one group is a registry convention unless exclusive membership is enabled
//! in [`GridConfig`](crate::config::GridConfig).

use super::ids::{GroupId, NodeId};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A group of nodes that can be stored in a [`ContainerGridGroups`](super::ContainerGridGroups)
pub trait GridGroup: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Identifier of this group
    fn id(&self) -> &GroupId;

    /// Check membership
    fn has_node(&self, id: &NodeId) -> bool;

    /// Add a member; `false` if it was already present
    fn insert_node(&mut self, id: NodeId) -> bool;

    /// Remove a member; `false` if it was not present
    fn remove_node(&mut self, id: &NodeId) -> bool;

    /// Members in the group's own order
    fn node_ids(&self) -> Vec<NodeId>;

    /// Number of members
    fn size(&self) -> usize {
        self.node_ids().len()
    }
}

// =============================================================================
// Container Group
// =============================================================================

/// Default group record, members kept in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerGroup {
    /// Group ID
    pub id: GroupId,
    /// Member node IDs
    pub members: IndexSet<NodeId>,
    /// Group labels
    pub labels: BTreeMap<String, String>,
}

impl ContainerGroup {
    pub fn new(id: impl Into<GroupId>) -> Self {
        Self {
            id: id.into(),
            members: IndexSet::new(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

impl GridGroup for ContainerGroup {
    fn id(&self) -> &GroupId {
        &self.id
    }

    fn has_node(&self, id: &NodeId) -> bool {
        self.members.contains(id)
    }

    fn insert_node(&mut self, id: NodeId) -> bool {
        self.members.insert(id)
    }

    fn remove_node(&mut self, id: &NodeId) -> bool {
        // shift_remove keeps the remaining members in insertion order
        self.members.shift_remove(id)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.members.iter().cloned().collect()
    }

    fn size(&self) -> usize {
        self.members.len()
    }
}
