//! Grid Events
//!
//! Events emitted by the registries for external consumers to react to
//! node and group lifecycle changes.

use crate::grid::{GridGroup, GridNode, GroupId, NodeId};
use serde::{Deserialize, Serialize};

/// Events emitted by the node registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridEvent<N> {
    /// A new node was added to the grid
    NodeAdded { node: N },

    /// A node was removed from the grid
    NodeRemoved { node: N },
}

impl<N: GridNode> GridEvent<N> {
    /// Get the node associated with this event
    pub fn node(&self) -> &N {
        match self {
            GridEvent::NodeAdded { node } => node,
            GridEvent::NodeRemoved { node } => node,
        }
    }

    /// Get the node ID associated with this event
    pub fn node_id(&self) -> &NodeId {
        self.node().id()
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            GridEvent::NodeAdded { .. } => "node_added",
            GridEvent::NodeRemoved { .. } => "node_removed",
        }
    }
}

/// Events emitted by the group registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupsEvent<N, G> {
    /// A new group was added
    GroupAdded { group: G },

    /// A group was removed
    GroupRemoved { group: G },

    /// A node joined a group
    NodeAdded { group: G, node: N },

    /// A node left a group
    NodeRemoved { group: G, node: N },
}

impl<N: GridNode, G: GridGroup> GroupsEvent<N, G> {
    /// Get the group associated with this event
    pub fn group(&self) -> &G {
        match self {
            GroupsEvent::GroupAdded { group } => group,
            GroupsEvent::GroupRemoved { group } => group,
            GroupsEvent::NodeAdded { group, .. } => group,
            GroupsEvent::NodeRemoved { group, .. } => group,
        }
    }

    /// Get the group ID associated with this event
    pub fn group_id(&self) -> &GroupId {
        self.group().id()
    }

    /// Get the node if this is a membership event
    pub fn node(&self) -> Option<&N> {
        match self {
            GroupsEvent::NodeAdded { node, .. } => Some(node),
            GroupsEvent::NodeRemoved { node, .. } => Some(node),
            _ => None,
        }
    }

    /// Check if this is a membership event
    pub fn is_membership_event(&self) -> bool {
        matches!(
            self,
            GroupsEvent::NodeAdded { .. } | GroupsEvent::NodeRemoved { .. }
        )
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            GroupsEvent::GroupAdded { .. } => "group_added",
            GroupsEvent::GroupRemoved { .. } => "group_removed",
            GroupsEvent::NodeAdded { .. } => "node_added_to_group",
            GroupsEvent::NodeRemoved { .. } => "node_removed_from_group",
        }
    }
}
