//! Node Registry
//!
//! Concurrent registry of grid nodes backed by a sharded DashMap. Inserts
//! and removals are atomic per node id: of several callers racing on the
//! same id exactly one wins, and only the winner emits an event.

use super::ids::NodeId;
use super::node::{ContainerNode, GridNode};
use crate::config::GridConfig;
use crate::error::Result;
use crate::events::{EventDispatcher, GridEvent, Listener};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// Statistics
// =============================================================================

/// Mutation counters shared by the node and group registries
#[derive(Debug, Default)]
pub struct GridStats {
    /// Successful node additions
    pub node_registrations: AtomicU64,
    /// Successful node removals
    pub node_deregistrations: AtomicU64,
    /// Successful group additions
    pub group_registrations: AtomicU64,
    /// Successful group removals
    pub group_deregistrations: AtomicU64,
    /// Nodes added to a group
    pub memberships_added: AtomicU64,
    /// Nodes removed from a group
    pub memberships_removed: AtomicU64,
}

/// Snapshot of registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GridStatsSnapshot {
    pub nodes: u64,
    pub groups: u64,
    pub node_registrations: u64,
    pub node_deregistrations: u64,
    pub group_registrations: u64,
    pub group_deregistrations: u64,
    pub memberships_added: u64,
    pub memberships_removed: u64,
    pub dispatch_failures: u64,
}

impl GridStats {
    /// Create a snapshot of the counters
    pub fn snapshot(&self) -> GridStatsSnapshot {
        GridStatsSnapshot {
            node_registrations: self.node_registrations.load(Ordering::Relaxed),
            node_deregistrations: self.node_deregistrations.load(Ordering::Relaxed),
            group_registrations: self.group_registrations.load(Ordering::Relaxed),
            group_deregistrations: self.group_deregistrations.load(Ordering::Relaxed),
            memberships_added: self.memberships_added.load(Ordering::Relaxed),
            memberships_removed: self.memberships_removed.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}

// =============================================================================
// Container Grid
// =============================================================================

/// Concurrent node registry
pub struct ContainerGrid<N: GridNode = ContainerNode> {
    /// Registered nodes
    nodes: DashMap<NodeId, N>,
    /// Node lifecycle listeners
    listeners: EventDispatcher<GridEvent<N>>,
    /// Mutation counters
    pub(crate) stats: GridStats,
}

impl<N: GridNode> ContainerGrid<N> {
    /// Create a registry with default config
    pub fn new() -> Self {
        Self::with_config(&GridConfig::default())
    }

    /// Create a registry with the given config
    pub fn with_config(config: &GridConfig) -> Self {
        let nodes = match config.shard_amount() {
            Some(amount) => DashMap::with_shard_amount(amount),
            None => DashMap::new(),
        };

        Self {
            nodes,
            listeners: EventDispatcher::with_panic_isolation(config.catch_listener_panics),
            stats: GridStats::default(),
        }
    }

    /// Add a node unless one with the same id is already registered.
    ///
    /// Returns `Ok(true)` and notifies listeners if the node was inserted,
    /// `Ok(false)` if the id was taken.
    pub fn add_node(&self, node: N) -> Result<bool> {
        let node_id = node.id().clone();
        node_id.validate()?;

        // The shard lock is released before listeners run
        let inserted = match self.nodes.entry(node_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(node.clone());
                true
            }
        };

        if !inserted {
            debug!("Node {} already registered", node_id);
            return Ok(false);
        }

        self.stats.node_registrations.fetch_add(1, Ordering::Relaxed);
        debug!("Node {} added", node_id);
        self.listeners.dispatch(&GridEvent::NodeAdded { node });
        Ok(true)
    }

    /// Remove a node. Returns `Ok(false)` if it was not registered.
    pub fn remove_node(&self, node_id: impl Into<NodeId>) -> Result<bool> {
        let node_id = node_id.into();
        node_id.validate()?;

        match self.take_node(&node_id) {
            Some(node) => {
                self.notify_removed(node);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a node without notifying listeners. The caller must pass the
    /// returned record to [`ContainerGrid::notify_removed`] once it holds no
    /// locks.
    pub(crate) fn take_node(&self, node_id: &NodeId) -> Option<N> {
        let Some((_, node)) = self.nodes.remove(node_id) else {
            debug!("Node {} not registered, nothing to remove", node_id);
            return None;
        };

        self.stats.node_deregistrations.fetch_add(1, Ordering::Relaxed);
        debug!("Node {} removed", node_id);
        Some(node)
    }

    pub(crate) fn notify_removed(&self, node: N) {
        self.listeners.dispatch(&GridEvent::NodeRemoved { node });
    }

    /// Get a node by ID
    pub fn get_node(&self, node_id: impl Into<NodeId>) -> Option<N> {
        self.nodes.get(&node_id.into()).map(|r| r.value().clone())
    }

    /// Check if a node exists
    pub fn contains_node(&self, node_id: impl Into<NodeId>) -> bool {
        self.nodes.contains_key(&node_id.into())
    }

    /// Snapshot of all nodes. Concurrent mutations may or may not be
    /// reflected.
    pub fn nodes(&self) -> Vec<N> {
        self.nodes.iter().map(|r| r.value().clone()).collect()
    }

    /// Snapshot of all node IDs
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of registered nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Register a node listener
    pub fn add_listener(&self, listener: Arc<dyn Listener<GridEvent<N>>>) {
        self.listeners.register(listener);
    }

    /// Get registry statistics
    pub fn stats(&self) -> GridStatsSnapshot {
        let mut snapshot = self.stats.snapshot();
        snapshot.nodes = self.nodes.len() as u64;
        snapshot.dispatch_failures = self.listeners.failure_count();
        snapshot
    }
}

impl<N: GridNode> Default for ContainerGrid<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: GridNode> std::fmt::Debug for ContainerGrid<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerGrid")
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}
