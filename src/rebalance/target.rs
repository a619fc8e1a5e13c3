//! Target Size Strategy
//!
//! Reference rebalancing strategy. Callers set a target size per group; the
//! strategy proposes taking the most recently added members out of groups
//! above target and filling groups below target with nodes that belong to no
//! group, in node id order. Nodes freed from one group are offered to the
//! others in the same plan.

use super::managed::RebalanceStrategy;
use super::plan::{GroupRebalance, GroupsRebalancePlan, ResizeState};
use crate::grid::{ContainerGridGroups, GridGroup, GridNode, GroupId, NodeId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, info};

/// A requested group size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupTarget {
    pub size: usize,
    pub state: ResizeState,
    pub requested_at: DateTime<Utc>,
}

/// Strategy that drives groups toward requested sizes
#[derive(Debug, Default)]
pub struct TargetSizeStrategy {
    targets: DashMap<GroupId, GroupTarget>,
}

impl TargetSizeStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current target for a group
    pub fn target(&self, group_id: impl Into<GroupId>) -> Option<GroupTarget> {
        self.targets.get(&group_id.into()).map(|t| *t.value())
    }

    /// Resize state for a group as of the last request or plan.
    ///
    /// Applying a plan does not update it; use
    /// [`TargetSizeStrategy::current_state`] to check against live membership.
    pub fn state(&self, group_id: impl Into<GroupId>) -> Option<ResizeState> {
        self.target(group_id).map(|t| t.state)
    }

    /// Resize state computed from the group's live membership, stored as the
    /// new state. `None` if the group has no target or is no longer registered.
    pub fn current_state<N: GridNode, G: GridGroup>(
        &self,
        groups: &ContainerGridGroups<N, G>,
        group_id: impl Into<GroupId>,
    ) -> Option<ResizeState> {
        let group_id = group_id.into();
        let target = self.target(&group_id)?;
        let group = groups.get_group(&group_id)?;

        let state = if group.size() == target.size {
            ResizeState::Stable
        } else {
            ResizeState::Resizing
        };
        self.set_state(&group_id, state);
        Some(state)
    }

    /// Drop the target for a group
    pub fn clear_target(&self, group_id: impl Into<GroupId>) -> bool {
        self.targets.remove(&group_id.into()).is_some()
    }

    fn set_state(&self, group_id: &GroupId, state: ResizeState) {
        if let Some(mut target) = self.targets.get_mut(group_id) {
            if target.state != state {
                debug!("Group {} is now {}", group_id, state);
                target.state = state;
            }
        }
    }
}

impl<N: GridNode, G: GridGroup> RebalanceStrategy<N, G> for TargetSizeStrategy {
    type Data = GroupsRebalancePlan;

    fn set_group_size(&self, groups: &ContainerGridGroups<N, G>, group_id: &GroupId, size: usize) -> bool {
        let Some(group) = groups.get_group(group_id) else {
            debug!("Rejecting resize of unknown group {}", group_id);
            return false;
        };

        let state = if group.size() == size {
            ResizeState::Stable
        } else {
            ResizeState::Resizing
        };

        // A newer request supersedes the previous one
        self.targets.insert(
            group_id.clone(),
            GroupTarget {
                size,
                state,
                requested_at: Utc::now(),
            },
        );
        info!(
            "Group {} target size set to {} (current {}, {})",
            group_id,
            size,
            group.size(),
            state
        );
        true
    }

    fn groups_rebalance_data(&self, groups: &ContainerGridGroups<N, G>) -> Option<GroupsRebalancePlan> {
        // Snapshot the targets so the map is not locked while planning
        let mut targets: Vec<(GroupId, usize)> = self
            .targets
            .iter()
            .map(|t| (t.key().clone(), t.value().size))
            .collect();
        if targets.is_empty() {
            return None;
        }
        targets.sort();

        let mut planned = Vec::with_capacity(targets.len());
        let mut freed = Vec::new();

        for (group_id, target) in targets {
            let Some(group) = groups.get_group(&group_id) else {
                debug!("Group {} no longer exists, dropping its target", group_id);
                self.targets.remove(&group_id);
                continue;
            };

            let members = group.node_ids();
            let nodes_to_remove: Vec<NodeId> = if members.len() > target {
                members.iter().rev().take(members.len() - target).cloned().collect()
            } else {
                Vec::new()
            };
            freed.extend(nodes_to_remove.iter().cloned());

            planned.push(GroupRebalance {
                group_id,
                current_size: members.len(),
                target_size: target,
                state: ResizeState::Stable,
                nodes_to_add: Vec::new(),
                nodes_to_remove,
                shortfall: 0,
            });
        }

        // Candidates: nodes owned by no group, then nodes freed above
        let owned: HashSet<NodeId> = groups.groups().iter().flat_map(|g| g.node_ids()).collect();
        let unassigned: BTreeSet<NodeId> = groups
            .nodes()
            .iter()
            .map(|n| n.id().clone())
            .filter(|id| !owned.contains(id))
            .collect();
        let mut candidates: VecDeque<NodeId> = unassigned.into_iter().chain(freed).collect();

        for entry in planned.iter_mut() {
            if entry.current_size < entry.target_size {
                let needed = entry.target_size - entry.current_size;
                while entry.nodes_to_add.len() < needed {
                    match candidates.pop_front() {
                        Some(id) => entry.nodes_to_add.push(id),
                        None => break,
                    }
                }
                entry.shortfall = needed - entry.nodes_to_add.len();
            }

            entry.state = if entry.is_converged() {
                ResizeState::Stable
            } else {
                ResizeState::Resizing
            };
            self.set_state(&entry.group_id, entry.state);
        }

        let plan = GroupsRebalancePlan::new(planned);
        debug!(
            "Rebalance plan covers {} groups with {} changes",
            plan.groups.len(),
            plan.total_moves()
        );
        Some(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ContainerGroup, ContainerNode};
    use crate::rebalance::ManagedContainerGridGroups;

    type Managed = ManagedContainerGridGroups<ContainerNode, ContainerGroup, TargetSizeStrategy>;

    fn grid_with(nodes: &[&str], groups: &[(&str, Vec<&str>)]) -> Managed {
        let managed = Managed::new(TargetSizeStrategy::new());
        for node in nodes {
            managed.add_node(ContainerNode::new(*node)).unwrap();
        }
        for (group, members) in groups {
            managed.add_group(ContainerGroup::new(*group)).unwrap();
            for member in members {
                assert!(managed.add_node_to_group(*group, *member).unwrap());
            }
        }
        managed
    }

    #[test]
    fn test_no_targets_no_data() {
        let managed = grid_with(&["n1"], &[("g1", vec![])]);
        assert!(managed.groups_rebalance_data().is_none());
    }

    #[test]
    fn test_unknown_group_is_rejected() {
        let managed = grid_with(&[], &[]);
        assert!(!managed.set_group_size("missing", 2));
        assert!(managed.strategy().target("missing").is_none());
    }

    #[test]
    fn test_grow_group_from_unassigned_nodes() {
        let managed = grid_with(&["n3", "n1", "n2"], &[("g1", vec!["n3"])]);

        assert!(managed.set_group_size("g1", 3));
        assert_eq!(managed.strategy().state("g1"), Some(ResizeState::Resizing));

        let plan = managed.groups_rebalance_data().unwrap();
        let g1 = plan.group(&"g1".into()).unwrap();
        assert_eq!(g1.nodes_to_add, vec![NodeId::from("n1"), NodeId::from("n2")]);
        assert_eq!(g1.shortfall, 0);

        assert_eq!(plan.apply(&managed).unwrap(), 2);
        assert_eq!(managed.get_group("g1").unwrap().size(), 3);

        let plan = managed.groups_rebalance_data().unwrap();
        assert!(plan.is_converged());
        assert_eq!(managed.strategy().state("g1"), Some(ResizeState::Stable));
    }

    #[test]
    fn test_current_state_follows_applied_plan() {
        let managed = grid_with(&["n1", "n2"], &[("g1", vec!["n1"])]);
        assert!(managed.set_group_size("g1", 2));

        let plan = managed.groups_rebalance_data().unwrap();
        assert_eq!(plan.apply(&managed).unwrap(), 1);

        // Stored state lags until refreshed
        assert_eq!(managed.strategy().state("g1"), Some(ResizeState::Resizing));
        assert_eq!(
            managed.strategy().current_state(&managed, "g1"),
            Some(ResizeState::Stable)
        );
        assert_eq!(managed.strategy().state("g1"), Some(ResizeState::Stable));
        assert_eq!(managed.strategy().current_state(&managed, "missing"), None);
    }

    #[test]
    fn test_shrink_removes_newest_members() {
        let managed = grid_with(&["n1", "n2", "n3"], &[("g1", vec!["n1", "n2", "n3"])]);

        assert!(managed.set_group_size("g1", 1));
        let plan = managed.groups_rebalance_data().unwrap();
        assert_eq!(
            plan.group(&"g1".into()).unwrap().nodes_to_remove,
            vec![NodeId::from("n3"), NodeId::from("n2")]
        );

        plan.apply(&managed).unwrap();
        assert_eq!(managed.get_group("g1").unwrap().node_ids(), vec![NodeId::from("n1")]);
    }

    #[test]
    fn test_freed_nodes_fill_other_groups() {
        let managed = grid_with(&["n1", "n2"], &[("a", vec!["n1", "n2"]), ("b", vec![])]);

        assert!(managed.set_group_size("a", 1));
        assert!(managed.set_group_size("b", 1));

        let plan = managed.groups_rebalance_data().unwrap();
        assert_eq!(plan.group(&"a".into()).unwrap().nodes_to_remove, vec![NodeId::from("n2")]);
        assert_eq!(plan.group(&"b".into()).unwrap().nodes_to_add, vec![NodeId::from("n2")]);

        assert_eq!(plan.apply(&managed).unwrap(), 2);
        assert_eq!(managed.group_by_node("n2").unwrap().id.as_str(), "b");
    }

    #[test]
    fn test_shortfall_when_not_enough_nodes() {
        let managed = grid_with(&["n1"], &[("g1", vec![])]);

        assert!(managed.set_group_size("g1", 3));
        let plan = managed.groups_rebalance_data().unwrap();
        let g1 = plan.group(&"g1".into()).unwrap();
        assert_eq!(g1.nodes_to_add.len(), 1);
        assert_eq!(g1.shortfall, 2);
        assert_eq!(g1.state, ResizeState::Resizing);
    }

    #[test]
    fn test_target_equal_to_size_is_stable() {
        let managed = grid_with(&["n1"], &[("g1", vec!["n1"])]);
        assert!(managed.set_group_size("g1", 1));
        assert_eq!(managed.strategy().state("g1"), Some(ResizeState::Stable));
    }

    #[test]
    fn test_newer_target_supersedes() {
        let managed = grid_with(&["n1", "n2"], &[("g1", vec!["n1"])]);

        assert!(managed.set_group_size("g1", 2));
        assert_eq!(managed.strategy().state("g1"), Some(ResizeState::Resizing));

        assert!(managed.set_group_size("g1", 1));
        assert_eq!(managed.strategy().target("g1").unwrap().size, 1);
        assert_eq!(managed.strategy().state("g1"), Some(ResizeState::Stable));

        let plan = managed.groups_rebalance_data().unwrap();
        assert!(plan.is_converged());
    }

    #[test]
    fn test_removed_group_drops_target() {
        let managed = grid_with(&[], &[("g1", vec![])]);
        assert!(managed.set_group_size("g1", 2));
        managed.remove_group("g1").unwrap();

        let plan = managed.groups_rebalance_data().unwrap();
        assert!(plan.groups.is_empty());
        assert!(managed.strategy().target("g1").is_none());
    }
}
