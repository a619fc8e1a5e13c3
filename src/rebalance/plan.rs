//! Rebalance Plan
//!
//! Membership changes proposed by a strategy, per group. A plan is only a
//! description; callers apply it through the registry's membership
//! operations, for instance with [`GroupsRebalancePlan::apply`].

use super::managed::GroupsRebalanceData;
use crate::error::Result;
use crate::grid::{ContainerGridGroups, GridGroup, GridNode, GroupId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Resize state of a group under a target-size strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeState {
    /// Membership matches the target
    Stable,
    /// Membership differs from the target
    Resizing,
}

impl std::fmt::Display for ResizeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResizeState::Stable => write!(f, "stable"),
            ResizeState::Resizing => write!(f, "resizing"),
        }
    }
}

/// Proposed changes for a single group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRebalance {
    pub group_id: GroupId,
    pub current_size: usize,
    pub target_size: usize,
    pub state: ResizeState,
    /// Nodes to add to the group
    pub nodes_to_add: Vec<NodeId>,
    /// Nodes to take out of the group
    pub nodes_to_remove: Vec<NodeId>,
    /// Nodes still missing after all candidates were assigned
    pub shortfall: usize,
}

impl GroupRebalance {
    /// Check if the group needs no changes
    pub fn is_converged(&self) -> bool {
        self.nodes_to_add.is_empty() && self.nodes_to_remove.is_empty()
    }
}

/// Proposed changes across all groups with a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsRebalancePlan {
    pub groups: Vec<GroupRebalance>,
    pub created_at: DateTime<Utc>,
}

impl GroupsRebalanceData for GroupsRebalancePlan {}

impl GroupsRebalancePlan {
    pub fn new(groups: Vec<GroupRebalance>) -> Self {
        Self {
            groups,
            created_at: Utc::now(),
        }
    }

    /// Changes for one group
    pub fn group(&self, group_id: &GroupId) -> Option<&GroupRebalance> {
        self.groups.iter().find(|g| &g.group_id == group_id)
    }

    /// Check if no group needs changes
    pub fn is_converged(&self) -> bool {
        self.groups.iter().all(GroupRebalance::is_converged)
    }

    /// Number of membership changes in the plan
    pub fn total_moves(&self) -> usize {
        self.groups
            .iter()
            .map(|g| g.nodes_to_add.len() + g.nodes_to_remove.len())
            .sum()
    }

    /// Apply the plan, removals first so freed nodes can join other groups.
    ///
    /// Returns the number of changes that took effect. Changes invalidated by
    /// concurrent mutations are skipped.
    pub fn apply<N: GridNode, G: GridGroup>(&self, grid: &ContainerGridGroups<N, G>) -> Result<usize> {
        let mut applied = 0;

        for group in &self.groups {
            for node_id in &group.nodes_to_remove {
                if grid.remove_node_from_group(&group.group_id, node_id)? {
                    applied += 1;
                } else {
                    debug!("Skipped removing {} from {}", node_id, group.group_id);
                }
            }
        }

        for group in &self.groups {
            for node_id in &group.nodes_to_add {
                if grid.add_node_to_group(&group.group_id, node_id)? {
                    applied += 1;
                } else {
                    debug!("Skipped adding {} to {}", node_id, group.group_id);
                }
            }
        }

        info!("Applied {} of {} rebalance changes", applied, self.total_moves());
        Ok(applied)
    }
}
