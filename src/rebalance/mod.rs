//! Rebalance Module
//!
//! Extension point for group rebalancing: the strategy contract, the managed
//! registry that hosts a strategy, the plan format and a reference
//! target-size strategy.

pub mod managed;
pub mod plan;
pub mod target;

pub use managed::*;
pub use plan::*;
pub use target::*;
