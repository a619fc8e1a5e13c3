//! Container Grid
//!
//! A concurrent, in-memory registry of the nodes of a distributed execution
//! cluster and the groups they are organized into, with synchronous event
//! dispatch on every membership change and a pluggable rebalance strategy.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                    ManagedContainerGridGroups                         │
//! │            (set_group_size / groups_rebalance_data)                   │
//! │  ┌────────────────────────────┐   ┌───────────────────────────────┐  │
//! │  │   ContainerGridGroups      │   │     RebalanceStrategy         │  │
//! │  │  groups: DashMap<GroupId>  │◄──┤  NoRebalance                  │  │
//! │  │  membership + move_node    │   │  TargetSizeStrategy           │  │
//! │  └─────────────┬──────────────┘   └───────────────────────────────┘  │
//! │                │                                                      │
//! │  ┌─────────────┴──────────────┐   ┌───────────────────────────────┐  │
//! │  │      ContainerGrid         │──►│      EventDispatcher          │  │
//! │  │   nodes: DashMap<NodeId>   │   │  ordered, failure isolated    │  │
//! │  └────────────────────────────┘   └───────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`grid`]: Node and group registries
//! - [`events`]: Event types, dispatcher and listeners
//! - [`rebalance`]: Rebalance contract, plans and the target-size strategy
//! - [`config`]: Registry configuration
//! - [`error`]: Error types and handling

pub mod config;
pub mod error;
pub mod events;
pub mod grid;
pub mod rebalance;

// Re-export commonly used types
pub use config::GridConfig;

pub use error::{Error, Result};

pub use events::{BroadcastListener, EventDispatcher, GridEvent, GroupsEvent, Listener};

pub use grid::{
    ContainerGrid, ContainerGridGroups, ContainerGroup, ContainerNode,
    GridGroup, GridNode, GridStatsSnapshot, GroupId, NodeId,
};

pub use rebalance::{
    GroupRebalance, GroupsRebalanceData, GroupsRebalancePlan,
    ManagedContainerGridGroups, NoRebalance, RebalanceStrategy, ResizeState,
    TargetSizeStrategy,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
