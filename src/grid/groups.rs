//! Group Registry
//!
//! Groups of grid nodes on top of the node registry. Groups are stored like
//! nodes (atomic per-id insert and remove); membership changes go through
//! [`ContainerGridGroups::add_node_to_group`],
//! [`ContainerGridGroups::remove_node_from_group`] and
//! [`ContainerGridGroups::move_node`], which emit membership events carrying
//! both the group and the node.
//!
//! Membership changes are serialized by a registry-wide lock so that moves
//! and exclusive-membership checks see a consistent view of all groups. The
//! node and group maps themselves never take that lock. Events are always
//! dispatched after every lock has been released.

use super::group::{ContainerGroup, GridGroup};
use super::ids::{GroupId, NodeId};
use super::node::{ContainerNode, GridNode};
use super::registry::{ContainerGrid, GridStatsSnapshot};
use crate::config::GridConfig;
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, GridEvent, GroupsEvent, Listener};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Concurrent registry of nodes and the groups they belong to
pub struct ContainerGridGroups<N: GridNode = ContainerNode, G: GridGroup = ContainerGroup> {
    /// Underlying node registry
    grid: ContainerGrid<N>,
    /// Registered groups
    groups: DashMap<GroupId, G>,
    /// Group and membership listeners
    listeners: EventDispatcher<GroupsEvent<N, G>>,
    /// Serializes membership changes
    membership: Mutex<()>,
    /// Refuse nodes already owned by another group
    exclusive_membership: bool,
}

impl<N: GridNode, G: GridGroup> ContainerGridGroups<N, G> {
    /// Create a registry with default config
    pub fn new() -> Self {
        Self::with_config(&GridConfig::default())
    }

    /// Create a registry with the given config
    pub fn with_config(config: &GridConfig) -> Self {
        let groups = match config.shard_amount() {
            Some(amount) => DashMap::with_shard_amount(amount),
            None => DashMap::new(),
        };

        Self {
            grid: ContainerGrid::with_config(config),
            groups,
            listeners: EventDispatcher::with_panic_isolation(config.catch_listener_panics),
            membership: Mutex::new(()),
            exclusive_membership: config.exclusive_membership,
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Add a node to the grid, see [`ContainerGrid::add_node`]
    pub fn add_node(&self, node: N) -> Result<bool> {
        self.grid.add_node(node)
    }

    /// Remove a node from the grid.
    ///
    /// The node leaves the grid and every group holding it in one step under
    /// the membership lock. Listeners then see a node-removed-from-group
    /// event per group, followed by the node-removed event of the grid.
    pub fn remove_node(&self, node_id: impl Into<NodeId>) -> Result<bool> {
        let node_id = node_id.into();
        node_id.validate()?;

        let (node, pending) = {
            let _guard = self.membership.lock();
            let Some(node) = self.grid.take_node(&node_id) else {
                return Ok(false);
            };
            let pending = self.strip_membership(&node, None);
            (node, pending)
        };

        self.dispatch_all(pending);
        self.grid.notify_removed(node);
        Ok(true)
    }

    /// Get a node by ID
    pub fn get_node(&self, node_id: impl Into<NodeId>) -> Option<N> {
        self.grid.get_node(node_id)
    }

    /// Check if a node exists
    pub fn contains_node(&self, node_id: impl Into<NodeId>) -> bool {
        self.grid.contains_node(node_id)
    }

    /// Snapshot of all nodes
    pub fn nodes(&self) -> Vec<N> {
        self.grid.nodes()
    }

    /// Number of registered nodes
    pub fn node_count(&self) -> usize {
        self.grid.node_count()
    }

    /// Register a node lifecycle listener
    pub fn add_grid_listener(&self, listener: Arc<dyn Listener<GridEvent<N>>>) {
        self.grid.add_listener(listener);
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Add a group unless one with the same id is already registered.
    ///
    /// Members the group already holds are taken as they are: they are not
    /// checked against the node registry and emit no membership events.
    /// With exclusive membership only empty groups are accepted.
    pub fn add_group(&self, group: G) -> Result<bool> {
        let group_id = group.id().clone();
        group_id.validate()?;
        if self.exclusive_membership && group.size() > 0 {
            return Err(Error::InvalidArgument(format!(
                "Group {} must be empty when membership is exclusive",
                group_id
            )));
        }

        let inserted = match self.groups.entry(group_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(group.clone());
                true
            }
        };

        if !inserted {
            debug!("Group {} already registered", group_id);
            return Ok(false);
        }

        self.grid.stats.group_registrations.fetch_add(1, Ordering::Relaxed);
        info!("Group {} added with {} nodes", group_id, group.size());
        self.listeners.dispatch(&GroupsEvent::GroupAdded { group });
        Ok(true)
    }

    /// Remove a group. Its members stay registered in the grid.
    pub fn remove_group(&self, group_id: impl Into<GroupId>) -> Result<bool> {
        let group_id = group_id.into();
        group_id.validate()?;

        let Some((_, group)) = self.groups.remove(&group_id) else {
            debug!("Group {} not registered, nothing to remove", group_id);
            return Ok(false);
        };

        self.grid.stats.group_deregistrations.fetch_add(1, Ordering::Relaxed);
        info!("Group {} removed", group_id);
        self.listeners.dispatch(&GroupsEvent::GroupRemoved { group });
        Ok(true)
    }

    /// Get a group by ID
    pub fn get_group(&self, group_id: impl Into<GroupId>) -> Option<G> {
        self.groups.get(&group_id.into()).map(|r| r.value().clone())
    }

    /// Snapshot of all groups
    pub fn groups(&self) -> Vec<G> {
        self.groups.iter().map(|r| r.value().clone()).collect()
    }

    /// Snapshot of all group IDs
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of registered groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Find the group that holds a node.
    ///
    /// Groups are scanned in map order and the first match is returned. If
    /// several groups claim the node, which one is returned is unspecified.
    pub fn group_by_node(&self, node_id: impl Into<NodeId>) -> Option<G> {
        let node_id = node_id.into();
        self.groups
            .iter()
            .find(|r| r.value().has_node(&node_id))
            .map(|r| r.value().clone())
    }

    /// Register a group and membership listener
    pub fn add_groups_listener(&self, listener: Arc<dyn Listener<GroupsEvent<N, G>>>) {
        self.listeners.register(listener);
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Add a registered node to a group.
    ///
    /// Returns `Ok(false)` if the group or the node is unknown, if the node
    /// is already a member, or, with exclusive membership, if another group
    /// owns the node.
    pub fn add_node_to_group(
        &self,
        group_id: impl Into<GroupId>,
        node_id: impl Into<NodeId>,
    ) -> Result<bool> {
        let group_id = group_id.into();
        let node_id = node_id.into();
        group_id.validate()?;
        node_id.validate()?;

        let event = {
            let _guard = self.membership.lock();

            let Some(node) = self.grid.get_node(&node_id) else {
                debug!("Node {} not registered, not adding to group {}", node_id, group_id);
                return Ok(false);
            };

            if self.exclusive_membership {
                if let Some(owner) = self.owner_other_than(&node_id, &group_id) {
                    debug!(
                        "Node {} already owned by group {}, not adding to group {}",
                        node_id, owner, group_id
                    );
                    return Ok(false);
                }
            }

            match self.insert_member(&group_id, node) {
                Some(event) => event,
                None => return Ok(false),
            }
        };

        self.dispatch_all(vec![event]);
        Ok(true)
    }

    /// Remove a node from a group. Returns `Ok(false)` if the group is
    /// unknown or the node is not a member.
    pub fn remove_node_from_group(
        &self,
        group_id: impl Into<GroupId>,
        node_id: impl Into<NodeId>,
    ) -> Result<bool> {
        let group_id = group_id.into();
        let node_id = node_id.into();
        group_id.validate()?;
        node_id.validate()?;

        let event = {
            let _guard = self.membership.lock();

            let group = {
                let Some(mut entry) = self.groups.get_mut(&group_id) else {
                    return Ok(false);
                };
                if !entry.remove_node(&node_id) {
                    return Ok(false);
                }
                entry.value().clone()
            };
            self.grid.stats.memberships_removed.fetch_add(1, Ordering::Relaxed);

            match self.grid.get_node(&node_id) {
                Some(node) => GroupsEvent::NodeRemoved { group, node },
                None => {
                    warn!(
                        "Removed unregistered node {} from group {}, no event emitted",
                        node_id, group_id
                    );
                    return Ok(true);
                }
            }
        };

        debug!("Node {} removed from group {}", node_id, group_id);
        self.dispatch_all(vec![event]);
        Ok(true)
    }

    /// Move a node into a group, taking it out of every group that currently
    /// holds it.
    ///
    /// Listeners see the removals before the addition. Returns `Ok(false)`
    /// if the node or target group is unknown, or if the target group is
    /// already the node's only group.
    pub fn move_node(&self, node_id: impl Into<NodeId>, to_group: impl Into<GroupId>) -> Result<bool> {
        let node_id = node_id.into();
        let to_group = to_group.into();
        node_id.validate()?;
        to_group.validate()?;

        let pending = {
            let _guard = self.membership.lock();

            let Some(node) = self.grid.get_node(&node_id) else {
                return Ok(false);
            };
            if !self.groups.contains_key(&to_group) {
                return Ok(false);
            }
            let already_home = self
                .get_group(&to_group)
                .map(|g| g.has_node(&node_id))
                .unwrap_or(false);
            if already_home && self.owner_other_than(&node_id, &to_group).is_none() {
                return Ok(false);
            }

            let mut pending = self.strip_membership(&node, Some(&to_group));
            if !already_home {
                // None if the target was removed concurrently
                if let Some(event) = self.insert_member(&to_group, node) {
                    pending.push(event);
                }
            }
            pending
        };

        info!("Node {} moved to group {}", node_id, to_group);
        self.dispatch_all(pending);
        Ok(true)
    }

    /// Get registry statistics covering nodes, groups and membership
    pub fn stats(&self) -> GridStatsSnapshot {
        let mut snapshot = self.grid.stats();
        snapshot.groups = self.groups.len() as u64;
        snapshot.dispatch_failures += self.listeners.failure_count();
        snapshot
    }

    // =========================================================================
    // Internals (membership lock held)
    // =========================================================================

    fn insert_member(&self, group_id: &GroupId, node: N) -> Option<GroupsEvent<N, G>> {
        let group = {
            let mut entry = self.groups.get_mut(group_id)?;
            if !entry.insert_node(node.id().clone()) {
                debug!("Node {} already in group {}", node.id(), group_id);
                return None;
            }
            entry.value().clone()
        };

        self.grid.stats.memberships_added.fetch_add(1, Ordering::Relaxed);
        debug!("Node {} added to group {}", node.id(), group_id);
        Some(GroupsEvent::NodeAdded { group, node })
    }

    fn strip_membership(&self, node: &N, keep: Option<&GroupId>) -> Vec<GroupsEvent<N, G>> {
        let mut events = Vec::new();
        for mut entry in self.groups.iter_mut() {
            if Some(entry.key()) == keep {
                continue;
            }
            if entry.remove_node(node.id()) {
                self.grid.stats.memberships_removed.fetch_add(1, Ordering::Relaxed);
                debug!("Node {} removed from group {}", node.id(), entry.key());
                events.push(GroupsEvent::NodeRemoved {
                    group: entry.value().clone(),
                    node: node.clone(),
                });
            }
        }
        events
    }

    fn owner_other_than(&self, node_id: &NodeId, group_id: &GroupId) -> Option<GroupId> {
        self.groups
            .iter()
            .find(|r| r.key() != group_id && r.value().has_node(node_id))
            .map(|r| r.key().clone())
    }

    fn dispatch_all(&self, events: Vec<GroupsEvent<N, G>>) {
        for event in &events {
            self.listeners.dispatch(event);
        }
    }
}

impl<N: GridNode, G: GridGroup> Default for ContainerGridGroups<N, G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: GridNode, G: GridGroup> std::fmt::Debug for ContainerGridGroups<N, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerGridGroups")
            .field("grid", &self.grid)
            .field("groups", &self.groups.len())
            .field("exclusive_membership", &self.exclusive_membership)
            .finish()
    }
}
