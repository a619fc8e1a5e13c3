//! Managed Groups
//!
//! The rebalance extension point. A [`RebalanceStrategy`] decides whether a
//! group resize request is accepted and what membership changes would bring
//! the groups to their targets. [`NoRebalance`] keeps the default behavior:
//! every request is rejected and no rebalance data is ever available.

use super::plan::GroupsRebalancePlan;
use crate::config::GridConfig;
use crate::grid::{ContainerGridGroups, ContainerGroup, ContainerNode, GridGroup, GridNode, GroupId};

/// Payload describing proposed membership changes
pub trait GroupsRebalanceData: std::fmt::Debug + Send + Sync {}

/// Capability implemented by rebalancing algorithms
pub trait RebalanceStrategy<N: GridNode, G: GridGroup>: Send + Sync {
    /// Rebalance data produced by this strategy
    type Data: GroupsRebalanceData;

    /// Request that a group be resized to `size` nodes. Returns whether the
    /// request was accepted.
    fn set_group_size(&self, groups: &ContainerGridGroups<N, G>, group_id: &GroupId, size: usize) -> bool {
        let _ = (groups, group_id, size);
        false
    }

    /// Current rebalance data, if any
    fn groups_rebalance_data(&self, groups: &ContainerGridGroups<N, G>) -> Option<Self::Data> {
        let _ = groups;
        None
    }
}

/// Strategy that never rebalances
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRebalance;

impl<N: GridNode, G: GridGroup> RebalanceStrategy<N, G> for NoRebalance {
    type Data = GroupsRebalancePlan;
}

// =============================================================================
// Managed Container Grid Groups
// =============================================================================

/// Group registry with a pluggable rebalance strategy.
///
/// Dereferences to the underlying [`ContainerGridGroups`], so every node,
/// group and membership operation is available directly.
pub struct ManagedContainerGridGroups<
    N: GridNode = ContainerNode,
    G: GridGroup = ContainerGroup,
    S: RebalanceStrategy<N, G> = NoRebalance,
> {
    groups: ContainerGridGroups<N, G>,
    strategy: S,
}

impl<N: GridNode, G: GridGroup, S: RebalanceStrategy<N, G>> ManagedContainerGridGroups<N, G, S> {
    /// Create a managed registry with default config
    pub fn new(strategy: S) -> Self {
        Self::with_config(&GridConfig::default(), strategy)
    }

    /// Create a managed registry with the given config
    pub fn with_config(config: &GridConfig, strategy: S) -> Self {
        Self {
            groups: ContainerGridGroups::with_config(config),
            strategy,
        }
    }

    /// Request that a group be resized, see [`RebalanceStrategy::set_group_size`]
    pub fn set_group_size(&self, group_id: impl Into<GroupId>, size: usize) -> bool {
        self.strategy.set_group_size(&self.groups, &group_id.into(), size)
    }

    /// Current rebalance data, see [`RebalanceStrategy::groups_rebalance_data`]
    pub fn groups_rebalance_data(&self) -> Option<S::Data> {
        self.strategy.groups_rebalance_data(&self.groups)
    }

    /// The strategy in use
    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

impl<N: GridNode, G: GridGroup, S: RebalanceStrategy<N, G> + Default> Default
    for ManagedContainerGridGroups<N, G, S>
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<N: GridNode, G: GridGroup, S: RebalanceStrategy<N, G>> std::ops::Deref
    for ManagedContainerGridGroups<N, G, S>
{
    type Target = ContainerGridGroups<N, G>;

    fn deref(&self) -> &Self::Target {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rebalance_is_constant() {
        let managed: ManagedContainerGridGroups = ManagedContainerGridGroups::default();

        assert!(!managed.set_group_size("g1", 3));
        assert!(managed.groups_rebalance_data().is_none());

        managed.add_node(ContainerNode::new("n1")).unwrap();
        managed.add_group(ContainerGroup::new("g1")).unwrap();
        managed.add_node_to_group("g1", "n1").unwrap();

        assert!(!managed.set_group_size("g1", 0));
        assert!(!managed.set_group_size("g1", 1));
        assert!(managed.groups_rebalance_data().is_none());
    }

    #[test]
    fn test_custom_strategy_overrides_only_what_it_needs() {
        struct AcceptAll;

        impl RebalanceStrategy<ContainerNode, ContainerGroup> for AcceptAll {
            type Data = GroupsRebalancePlan;

            fn set_group_size(
                &self,
                groups: &ContainerGridGroups<ContainerNode, ContainerGroup>,
                group_id: &GroupId,
                _size: usize,
            ) -> bool {
                groups.get_group(group_id).is_some()
            }
        }

        let managed: ManagedContainerGridGroups<ContainerNode, ContainerGroup, AcceptAll> =
            ManagedContainerGridGroups::new(AcceptAll);
        managed.add_group(ContainerGroup::new("g1")).unwrap();

        assert!(managed.set_group_size("g1", 2));
        assert!(!managed.set_group_size("missing", 2));
        assert!(managed.groups_rebalance_data().is_none());
    }
}
