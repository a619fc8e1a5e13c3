//! Grid Module
//!
//! Concurrent node and group registries. Nodes and groups live in sharded
//! maps with per-key atomic insert and remove; every successful mutation is
//! followed by a synchronous event dispatch on the calling thread.

pub mod group;
pub mod groups;
pub mod ids;
pub mod node;
pub mod registry;

pub use group::*;
pub use groups::*;
pub use ids::*;
pub use node::*;
pub use registry::*;
